use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use gitleaf::build::{build_site, Options};
use gitleaf::config::Config;
use gitleaf::document::Document;
use gitleaf::git::Remote;
use gitleaf::markdown::MarkdownRenderer;
use gitleaf::summary::Summary;
use gitleaf::template::Theme;
use gitleaf::write::{Sink, Writer};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Parser)]
#[command(name = "gitleaf")]
#[command(version, about = "Turns a git repository of markdown posts into a static blog")]
struct Cli {
    /// Raise the log level (-v warn, -vv info, -vvv debug, -vvvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Where logs go, `-` for stdout [default: stderr]
    #[arg(long, global = true)]
    log_file: Option<String>,

    /// The global settings file
    #[arg(short, long = "setting", global = true)]
    setting: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a single markdown file through the post template
    Post {
        /// The markdown file
        path: PathBuf,

        /// Where the page goes, `-` for stdout
        #[arg(short, long, default_value = "-")]
        output: Sink,

        /// The page title, instead of the first heading
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Clone a repository and generate its site
    Clone {
        /// The http(s) URL of the repository
        repo: String,

        /// The output directory, recreated on every run
        #[arg(short, long, default_value = "build")]
        output: PathBuf,

        /// The username used for basic auth
        #[arg(short = 'U', long)]
        username: Option<String>,

        /// The password used for basic auth
        #[arg(short = 'P', long)]
        password: Option<String>,

        /// Keep the cloned workspace after the build
        #[arg(long)]
        no_purge: bool,
    },

    /// Print the effective settings as YAML
    Config,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("gitleaf: {:#}", err);
        std::process::exit(2);
    }
    if let Err(err) = run(cli) {
        error!(error = %format!("{:#}", err), "gitleaf failed");
        eprintln!("gitleaf: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.setting {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Post {
            path,
            output,
            title,
        } => render_post(&config, &path, &output, title),
        Command::Clone {
            repo,
            output,
            username,
            password,
            no_purge,
        } => {
            let options = Options {
                remote: Remote::parse(&repo, username.as_deref(), password.as_deref())?,
                output,
                purge: !no_purge,
            };
            build_site(config, &options)?;
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

fn render_post(config: &Config, path: &Path, output: &Sink, title: Option<String>) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening `{}`", path.display()))?;
    let mut document = Document::from_reader(path.to_string_lossy(), file)
        .with_context(|| format!("reading `{}`", path.display()))?;
    if let Some(title) = title {
        document.set_title(&title);
    }
    let now = Utc::now();
    document.created_at = now;
    document.updated_at = now;
    document.render_html(&MarkdownRenderer);

    let theme = Theme::load(config, Path::new("."))?;
    let writer = Writer {
        theme: &theme,
        config,
        now,
    };
    let mut w = output.open().with_context(|| format!("opening {:?}", output))?;
    writer.write_document(&mut w, &document, &Summary::default())?;
    Ok(())
}

/// Installs the process-wide subscriber.
fn init_logging(verbose: u8, log_file: Option<&str>) -> Result<()> {
    let level = match verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let (writer, ansi) = match log_file {
        None => (BoxMakeWriter::new(std::io::stderr), true),
        Some("-") => (BoxMakeWriter::new(std::io::stdout), true),
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file `{}`", path))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(ansi)
        .init();
    Ok(())
}
