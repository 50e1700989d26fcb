use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use safecan_client::{
    commission,
    common::{node_id::InvalidNodeIdError, profile::ProfileError, NodeId},
    verify, CommissioningFailure, FailurePolicy, MappingComparison, NodeProfile, Session,
    SimNode, SimStateError, VerificationFailure, VerifyOptions,
};
use snafu::{ResultExt, Snafu};

#[derive(Parser, Debug)]
#[command(
    name = "safecan",
    version,
    about = "Commission and verify the safety configuration of drive nodes"
)]
struct Args {
    /// Load the profile from a TOML file instead of selecting a built-in profile by role
    #[clap(long, global = true)]
    profile_file: Option<PathBuf>,
    /// State file of the simulated node. Created by commission if it does not exist.
    #[clap(long, global = true)]
    state: Option<PathBuf>,
    /// Override the node ID of the profile (decimal or 0x prefixed hex)
    #[clap(long, global = true, value_parser = maybe_hex::<u8>)]
    node_id: Option<u8>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore factory defaults and write the profile configuration to the node
    Commission {
        /// Node role, e.g. `left` or `swd_right`
        role: Option<String>,
    },
    /// Read back the node configuration and compare it with the profile
    Verify {
        /// Node role, e.g. `left` or `swd_right`
        role: Option<String>,
        /// Require unmapped control word bits to be NONE
        #[clap(long)]
        full_width_mappings: bool,
        /// Check every domain instead of stopping at the first failure
        #[clap(long)]
        report_all: bool,
    },
    /// List the built-in profiles
    List,
    /// Print a profile as TOML
    Show {
        /// Node role, e.g. `left` or `swd_right`
        role: Option<String>,
    },
}

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("Either a role or --profile-file must be given"))]
    MissingRole,
    #[snafu(display("{source}"))]
    Profile { source: ProfileError },
    #[snafu(display("{source}"))]
    NodeId { source: InvalidNodeIdError },
    #[snafu(display("{source}"))]
    State { source: SimStateError },
    #[snafu(display("{source}"))]
    Show { source: toml::ser::Error },
    #[snafu(display("{source}\n\nCommissioning failed !"))]
    Commissioning { source: CommissioningFailure },
    #[snafu(display("{}\n\nCheck commissioning failed !", describe_verification(source)))]
    Verification { source: VerificationFailure },
}

fn describe_verification(failure: &VerificationFailure) -> String {
    match failure {
        VerificationFailure::Multiple { failures } => failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn load_profile(args: &Args, role: Option<&str>) -> Result<NodeProfile, CliError> {
    let profile = match (&args.profile_file, role) {
        (Some(path), _) => NodeProfile::load_from_file(path).context(ProfileSnafu)?,
        (None, Some(role)) => NodeProfile::builtin(role).context(ProfileSnafu)?,
        (None, None) => return MissingRoleSnafu.fail(),
    };
    log::info!(
        "Using profile {} revision {} (node {})",
        profile.name,
        profile.revision,
        profile.node_id
    );
    match args.node_id {
        Some(id) => {
            let node_id = NodeId::new(id).context(NodeIdSnafu)?;
            profile.with_node_id(node_id).context(ProfileSnafu)
        }
        None => Ok(profile),
    }
}

fn open_node(args: &Args) -> Result<SimNode, CliError> {
    match &args.state {
        Some(path) => SimNode::load_state(path).context(StateSnafu),
        None => Ok(SimNode::new()),
    }
}

fn print_journal<C>(session: &Session<C>) {
    for step in session.journal() {
        println!("{step}");
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    match &args.command {
        Command::Commission { role } => {
            let profile = load_profile(&args, role.as_deref())?;
            let mut session = Session::new(open_node(&args)?);
            let result = commission(&mut session, &profile).await;
            print_journal(&session);
            if let Some(path) = &args.state {
                session
                    .into_client()
                    .save_state(path)
                    .context(StateSnafu)?;
            }
            result.context(CommissioningSnafu)?;
            println!("\nCommissioning succeeded !");
        }
        Command::Verify {
            role,
            full_width_mappings,
            report_all,
        } => {
            let profile = load_profile(&args, role.as_deref())?;
            let options = VerifyOptions {
                mapping_comparison: if *full_width_mappings {
                    MappingComparison::FullWidth
                } else {
                    MappingComparison::Prefix
                },
                failure_policy: if *report_all {
                    FailurePolicy::CollectAll
                } else {
                    FailurePolicy::StopAtFirst
                },
            };
            let mut session = Session::new(open_node(&args)?);
            let result = verify(&mut session, &profile, options).await;
            print_journal(&session);
            result.context(VerificationSnafu)?;
            println!("\nCheck commissioning succeeded !");
        }
        Command::List => {
            for name in NodeProfile::builtin_names() {
                let profile = NodeProfile::builtin(name).context(ProfileSnafu)?;
                println!(
                    "{name}: node {} revision {} {}",
                    profile.node_id, profile.revision, profile.description
                );
            }
        }
        Command::Show { role } => {
            let profile = load_profile(&args, role.as_deref())?;
            print!("{}", toml::to_string(&profile).context(ShowSnafu)?);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
