//! `rvm` — the RVM command-line front end: run, compile, and inspect RA/RSI
//! programs (spec §6.1).

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser as ClapParser;
use log::error;

use rvm::dispatcher::{Dispatcher, Flow};
use rvm::host::Console;
use rvm::logger::{init_logger, init_logger_debug};
use rvm::parser::Parser as RaParser;
use rvm::serializer::{Profile, Serializer};

#[derive(ClapParser, Debug)]
#[command(
    name = "rvm",
    about = "A register-less instruction-stream virtual machine for the RA assembly language",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    #[arg(long = "help", short = 'h')]
    help: bool,
    #[arg(long = "help-option", value_name = "NAME")]
    help_option: Option<String>,
    #[arg(long = "version", short = 'v')]
    version: bool,
    #[arg(long = "vs-check", visible_alias = "vc")]
    vs_check: bool,
    #[arg(long = "run", short = 'r')]
    run: bool,
    #[arg(long = "comp", short = 'c')]
    comp: bool,
    #[arg(long = "debug", visible_alias = "db", short = 'd')]
    debug: bool,
    #[arg(long = "time-info", visible_alias = "ti")]
    time_info: bool,
    #[arg(long = "rvm-work-directory", visible_alias = "rwd")]
    rvm_work_directory: bool,
    #[arg(long = "precomp-link", visible_alias = "pcl")]
    precomp_link: bool,
    #[arg(long = "precomp-link-dir", value_name = "DIR")]
    precomp_link_dir: Option<PathBuf>,
    #[arg(long = "output-redirect", visible_alias = "or", value_name = "PATH|console")]
    output_redirect: Option<String>,
    #[arg(long = "enable-colorful-output", visible_alias = "clr", value_name = "BOOL")]
    enable_colorful_output: Option<bool>,
    #[arg(long = "target", short = 't', value_name = "PATH")]
    target: Option<PathBuf>,
    #[arg(long = "archive", short = 'a', value_name = "PATH")]
    archive: Option<PathBuf>,
    #[arg(long = "comp-level", visible_alias = "cl", value_name = "PROFILE", default_value = "debug")]
    comp_level: String,
}

fn parse_profile(name: &str) -> Result<Profile, String> {
    match name.to_ascii_lowercase().as_str() {
        "debug" => Ok(Profile::Debug),
        "testing" => Ok(Profile::Testing),
        "release" => Ok(Profile::Release),
        "minified" => Ok(Profile::Minified),
        other => Err(format!("unknown profile '{other}' (expected debug|testing|release|minified)")),
    }
}

/// Checks the mutual-exclusion rules from spec §6.1 before doing anything
/// with the parsed flags.
fn validate(cli: &Cli) -> Result<(), String> {
    if cli.run && cli.comp {
        return Err("--run and --comp are mutually exclusive".into());
    }
    let selectors = [cli.help, cli.version, cli.vs_check].iter().filter(|b| **b).count();
    if selectors > 1 {
        return Err("--help, --version and --vs-check are mutually exclusive".into());
    }
    if (cli.run || cli.comp) && cli.target.is_none() {
        return Err("--run/--comp require --target".into());
    }
    if cli.debug && !cli.run {
        return Err("--debug requires --run".into());
    }
    if cli.vs_check && cli.target.is_none() {
        return Err("--vs-check requires --target".into());
    }
    if cli.precomp_link && cli.precomp_link_dir.is_none() {
        return Err("--precomp-link requires --precomp-link-dir".into());
    }
    Ok(())
}

fn print_help(option: Option<&str>) {
    const FLAGS: &[(&str, &str)] = &[
        ("--help, -h", "Print help (or description of one option), then exit."),
        ("--version, -v", "Print version banner, exit."),
        ("--vs-check, -vc", "Read RSI header from --target, print version info, exit."),
        ("--run, -r", "Execute --target (RA or RSI)."),
        ("--comp, -c", "Parse --target, write RSI to --archive at profile --comp-level."),
        ("--debug, -d, -db", "Enables interactive stepping (requires --run)."),
        ("--time-info, -ti", "Print wall-clock summary on exit."),
        ("--rvm-work-directory, -rwd", "Use the installation dir as working dir."),
        ("--precomp-link, -pcl", "Precompile linked files (requires --precomp-link-dir)."),
        ("--output-redirect, -or PATH|console", "Redirect VM stdout."),
        ("--enable-colorful-output, -clr bool", "Toggle ANSI."),
    ];
    match option {
        Some(name) => match FLAGS.iter().find(|(flag, _)| flag.contains(name)) {
            Some((flag, desc)) => println!("{flag}\n  {desc}"),
            None => println!("no such option '{name}'"),
        },
        None => {
            println!("rvm {} — a register-less instruction-stream virtual machine", env!("CARGO_PKG_VERSION"));
            for (flag, desc) in FLAGS {
                println!("  {flag:<38} {desc}");
            }
        }
    }
}

/// A console that writes to a file or to stdout depending on
/// `--output-redirect`.
struct RedirectConsole {
    sink: Box<dyn Write>,
}

impl Console for RedirectConsole {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.sink.write_all(text.as_bytes())?;
        self.sink.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(buf)
    }
}

fn load(target: &Path, base_dir: &Path) -> Result<rvm::instruction::InsSet, String> {
    let bytes = std::fs::read(target).map_err(|e| format!("{}: {e}", target.display()))?;
    if bytes.len() >= 4 && u32::from_le_bytes(bytes[0..4].try_into().unwrap()) == 0x5253_4931 {
        let (ins_set, _extensions) = Serializer::read(&bytes, None).map_err(|e| e.to_string())?;
        Ok(ins_set)
    } else {
        let src = String::from_utf8(bytes).map_err(|e| e.to_string())?;
        let mut parser = RaParser::new(Some(target.display().to_string()), base_dir.to_path_buf());
        parser.parse(&src).map_err(|e| e.render_full())
    }
}

fn run_program(cli: &Cli, target: &Path, base_dir: &Path) -> i32 {
    let ins_set = match load(target, base_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let mut disp = Dispatcher::new(base_dir.to_path_buf());
    if let Some(redirect) = &cli.output_redirect {
        if redirect != "console" {
            match std::fs::File::create(redirect) {
                Ok(f) => disp.console = Box::new(RedirectConsole { sink: Box::new(f) }),
                Err(e) => {
                    eprintln!("cannot open redirect target '{redirect}': {e}");
                    return 1;
                }
            }
        }
    }
    if cli.debug {
        init_logger_debug();
    }

    match disp.execute(&ins_set) {
        Ok(Flow::Normal) | Ok(Flow::Aborted(_)) | Ok(Flow::AbortedFunction) => 0,
        Ok(Flow::Exposed(inst)) => {
            error!("uncaught exposed instance of type '{}'", inst.borrow().type_def.borrow().name);
            1
        }
        Ok(Flow::Jump(_)) => unreachable!("a top-level jump can never escape execute"),
        Err(e) => {
            error!("{}", e.render_full());
            1
        }
    }
}

fn compile(target: &Path, archive: &Path, profile: Profile, base_dir: &Path) -> Result<(), String> {
    let mut parser = RaParser::new(Some(target.display().to_string()), base_dir.to_path_buf());
    let src = std::fs::read_to_string(target).map_err(|e| format!("{}: {e}", target.display()))?;
    let ins_set = parser.parse(&src).map_err(|e| e.render_full())?;
    let bytes = Serializer::write(&ins_set, profile, &[]).map_err(|e| e.to_string())?;
    std::fs::write(archive, bytes).map_err(|e| format!("{}: {e}", archive.display()))
}

fn vs_check(target: &Path) -> Result<String, String> {
    let bytes = std::fs::read(target).map_err(|e| format!("{}: {e}", target.display()))?;
    let (_ins_set, extensions) = Serializer::read(&bytes, None).map_err(|e| e.to_string())?;
    Ok(format!("{}: {} extension(s) declared", target.display(), extensions.len()))
}

fn main() {
    let cli = Cli::parse();
    init_logger();
    let start = Instant::now();

    if let Err(e) = validate(&cli) {
        eprintln!("{e}");
        std::process::exit(2);
    }

    if cli.help || cli.help_option.is_some() {
        print_help(cli.help_option.as_deref());
        std::process::exit(0);
    }
    if cli.version {
        println!("rvm {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    let base_dir = if cli.rvm_work_directory {
        std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)).unwrap_or_else(|| PathBuf::from("."))
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    };

    if cli.vs_check {
        let target = cli.target.as_ref().expect("validated above");
        match vs_check(target) {
            Ok(msg) => {
                println!("{msg}");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }

    let status = if cli.comp {
        let target = cli.target.as_ref().expect("validated above");
        let archive = cli.archive.clone().unwrap_or_else(|| PathBuf::from("a.rsi"));
        let profile = match parse_profile(&cli.comp_level) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(2);
            }
        };
        match compile(target, &archive, profile, &base_dir) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{e}");
                1
            }
        }
    } else if cli.run {
        let target = cli.target.as_ref().expect("validated above");
        run_program(&cli, target, &base_dir)
    } else {
        print_help(None);
        0
    };

    if cli.time_info {
        eprintln!("elapsed: {:?}", start.elapsed());
    }
    std::process::exit(status);
}
