use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use zap_domain::{Coordinate, MavenRepository, MavenScope, RepositoryUrlError};

pub const ZAP_BEFORE_HELP: &str = concat!(
    "zap ",
    env!("CARGO_PKG_VERSION"),
    " – runtime dependency fetcher for Maven repositories\n\n",
    "  resolve          Download, verify, relocate, and stage declared dependencies.\n",
    "  tree             Expand a coordinate's transitive dependencies from its descriptor.\n",
    "  path             Show the URLs a coordinate resolves to in a repository.\n",
);

#[derive(Parser, Debug)]
#[command(author, version, disable_help_subcommand = true, before_help = ZAP_BEFORE_HELP)]
#[allow(clippy::struct_excessive_bools)]
pub struct ZapCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)", global = true)]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        long,
        help = "Never touch the network for this invocation (sets ZAP_ONLINE=0)",
        global = true
    )]
    pub offline: bool,
    #[command(subcommand)]
    pub command: CommandCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandCli {
    #[command(about = "Resolve and stage the dependencies declared in a configuration directory")]
    Resolve(ResolveArgs),
    #[command(about = "List the transitive dependencies of a coordinate")]
    Tree(TreeArgs),
    #[command(about = "Print artifact, descriptor, and checksum URLs for a coordinate")]
    Path(PathArgs),
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[arg(
        long,
        value_name = "DIR",
        default_value = ".",
        help = "Directory holding zapper.properties and the dependency lists"
    )]
    pub config: PathBuf,
    #[arg(
        long,
        value_name = "DIR",
        help = "Base directory for the libs folder (defaults to the current directory)"
    )]
    pub data_dir: Option<PathBuf>,
    #[arg(
        long,
        value_name = "FILE",
        help = "Library loader manifest to append staged archives to (overrides ZAP_LIBRARY_LOADER)"
    )]
    pub loader_manifest: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PROGRAM",
        help = "Relocation program, invoked as PROGRAM <input> <output> <from>=<to>..."
    )]
    pub relocator: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[arg(value_name = "GROUP:ARTIFACT:VERSION[:CLASSIFIER]")]
    pub coordinate: Coordinate,
    #[arg(long = "scope", value_name = "SCOPE", help = "Also follow dependencies in this scope (compile is always followed)")]
    pub scopes: Vec<MavenScope>,
    #[arg(
        long = "repo",
        value_name = "URL",
        value_parser = parse_repository,
        help = "Additional repository to search after Maven Central"
    )]
    pub repositories: Vec<MavenRepository>,
    #[arg(long, help = "Only list direct dependencies")]
    pub no_recursive: bool,
    #[arg(long, requires = "repositories", help = "Search only the --repo repositories, not Maven Central")]
    pub no_central: bool,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    #[arg(value_name = "GROUP:ARTIFACT:VERSION[:CLASSIFIER]")]
    pub coordinate: Coordinate,
    #[arg(
        long = "repo",
        value_name = "URL",
        value_parser = parse_repository,
        help = "Repository to resolve against (defaults to Maven Central)"
    )]
    pub repository: Option<MavenRepository>,
}

fn parse_repository(raw: &str) -> Result<MavenRepository, RepositoryUrlError> {
    MavenRepository::new(raw)
}
