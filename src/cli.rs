use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ssh-to-terminal",
    version,
    about = "Add SSH hosts as profiles to Windows Terminal settings.json",
    group(ArgGroup::new("action").required(true).multiple(true).args(["add", "remove"])),
    after_help = concat!(
        "EXAMPLES:\n",
        "  Add every host under ~/.ssh:        ssh-to-terminal --add\n",
        "  Refresh (drop and recreate):        ssh-to-terminal --remove --add\n",
        "  Skip some hosts:                    ssh-to-terminal --add -e bastion,github.com\n",
        "  Preview without writing:            ssh-to-terminal --add --dry-run"
    )
)]
pub struct Cli {
    #[arg(short = 'd', long, help = "Show debug messages")]
    pub debug: bool,

    #[arg(short = 's', long, value_name = "PATH", help = "SSH directory to scan [default: ~/.ssh]")]
    pub ssh_dir: Option<PathBuf>,

    #[arg(short = 'n', long, help = "Do not search subdirectories of the SSH directory")]
    pub nosubdir: bool,

    #[arg(
        short = 't',
        long,
        value_name = "PATH",
        help = "Path to Windows Terminal settings.json [default: auto-detected]"
    )]
    pub terminal: Option<PathBuf>,

    #[arg(short = 'a', long, help = "Add SSH config hosts to settings.json")]
    pub add: bool,

    #[arg(short = 'r', long, help = "Remove SSH config hosts from settings.json")]
    pub remove: bool,

    #[arg(
        short = 'e',
        long,
        value_name = "NAME,...",
        value_delimiter = ',',
        help = "Host names to leave alone (comma-separated, repeatable)"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long,
        value_name = "FILE,...",
        value_delimiter = ',',
        help = "SSH config file names to skip while scanning"
    )]
    pub exclude_file: Vec<String>,

    #[arg(long, help = "Print the resulting settings.json instead of writing it")]
    pub dry_run: bool,

    #[arg(long, help = "Do not keep a timestamped backup of settings.json")]
    pub no_backup: bool,

    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        help = "Config file [default: <config dir>/ssh-to-terminal/config.toml]"
    )]
    pub config: Option<PathBuf>,
}
