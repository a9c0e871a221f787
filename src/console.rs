//! Management console commands
//!
//! Parses `homekit <subcommand>` arguments and renders results for an
//! operator. Accessories whose names cannot be resolved are still printed,
//! with a placeholder.

use std::io::Write;

use crate::Result;
use crate::accessory::AccessoryEntry;
use crate::bridge::Bridge;

/// Console command namespace
pub const COMMAND: &str = "homekit";

const SUBCMD_CLEAR_PAIRINGS: &str = "clearPairings";
const SUBCMD_LIST_ACCESSORIES: &str = "list";
const SUBCMD_PRINT_ACCESSORY: &str = "show";
const SUBCMD_ALLOW_UNAUTHENTICATED: &str = "allowUnauthenticated";
const LEGACY_SUBCMD_LIST_ACCESSORIES: &str = "listAccessories";
const LEGACY_SUBCMD_PRINT_ACCESSORY: &str = "printAccessory";

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Remove all pairings with HomeKit clients
    ClearPairings,

    /// List all accessories
    List { legacy: bool },

    /// Print details of accessories matching an id or name
    Show { query: Option<String>, legacy: bool },

    /// Enable or disable unauthenticated access
    AllowUnauthenticated(Option<bool>),

    /// Unrecognised subcommand
    Unknown(String),

    /// No subcommand given
    Usage,
}

impl ConsoleCommand {
    /// Parse subcommand arguments (without the `homekit` prefix)
    #[must_use]
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Self {
        let Some(sub) = args.first().map(AsRef::as_ref) else {
            return Self::Usage;
        };
        let arg = args.get(1).map(|a| a.as_ref().to_string());

        match sub {
            SUBCMD_CLEAR_PAIRINGS => Self::ClearPairings,
            SUBCMD_ALLOW_UNAUTHENTICATED => {
                // Anything other than "true" means false
                Self::AllowUnauthenticated(arg.map(|a| a.eq_ignore_ascii_case("true")))
            }
            SUBCMD_LIST_ACCESSORIES => Self::List { legacy: false },
            LEGACY_SUBCMD_LIST_ACCESSORIES => Self::List { legacy: true },
            SUBCMD_PRINT_ACCESSORY => Self::Show {
                query: arg,
                legacy: false,
            },
            LEGACY_SUBCMD_PRINT_ACCESSORY => Self::Show {
                query: arg,
                legacy: true,
            },
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Usage lines, one per subcommand
#[must_use]
pub fn usages() -> Vec<String> {
    [
        (SUBCMD_LIST_ACCESSORIES.to_string(), "list all HomeKit accessories"),
        (
            format!("{SUBCMD_PRINT_ACCESSORY} <accessory id | accessory name>"),
            "print additional details of the accessories which partially match provided ID or name.",
        ),
        (
            SUBCMD_CLEAR_PAIRINGS.to_string(),
            "removes all pairings with HomeKit clients.",
        ),
        (
            format!("{SUBCMD_ALLOW_UNAUTHENTICATED} <boolean>"),
            "enables or disables unauthenticated access to facilitate debugging",
        ),
    ]
    .into_iter()
    .map(|(syntax, description)| format!("{COMMAND} {syntax} - {description}"))
    .collect()
}

/// Run a console command against the bridge, writing output to `out`
///
/// Bridge failures are reported on `out` and logged; only failures to
/// write output are returned.
///
/// # Errors
///
/// Returns `Error::Io` if writing to `out` fails
pub async fn execute<W: Write + Send>(
    bridge: &Bridge,
    command: &ConsoleCommand,
    out: &mut W,
) -> Result<()> {
    match command {
        ConsoleCommand::ClearPairings => match bridge.clear_pairings().await {
            Ok(_) => writeln!(out, "Cleared HomeKit pairings")?,
            Err(e) => writeln!(out, "Could not clear HomeKit pairings: {e}")?,
        },
        ConsoleCommand::AllowUnauthenticated(Some(allow)) => {
            bridge.set_unauthenticated_access(*allow);
            let verb = if *allow { "Enabled" } else { "Disabled" };
            writeln!(out, "{verb} unauthenticated HomeKit access")?;
        }
        ConsoleCommand::AllowUnauthenticated(None) => {
            writeln!(out, "true/false is required as an argument")?;
        }
        ConsoleCommand::List { legacy } => {
            for entry in bridge.accessories().await {
                writeln!(out, "{} {}", entry.id(), entry.name)?;
            }
            if *legacy {
                writeln!(out)?;
                writeln!(out, "Hey, you can use the shorter command '{COMMAND} list'")?;
            }
        }
        ConsoleCommand::Show { query, legacy } => {
            match query {
                Some(query) => {
                    let matches = bridge.find_accessories(query).await;
                    if matches.is_empty() {
                        writeln!(out, "No accessory matches '{query}'")?;
                    }
                    for entry in &matches {
                        print_accessory(entry, out)?;
                    }
                }
                None => writeln!(out, "accessory id or name is required as an argument")?,
            }
            if *legacy {
                writeln!(out)?;
                writeln!(
                    out,
                    "Hey, you can use the shorter command '{COMMAND} show <accessory_id|name>'"
                )?;
            }
        }
        ConsoleCommand::Unknown(sub) => {
            writeln!(out, "Unknown command '{sub}'")?;
            print_usage(out)?;
        }
        ConsoleCommand::Usage => print_usage(out)?,
    }

    Ok(())
}

fn print_accessory<W: Write>(entry: &AccessoryEntry, out: &mut W) -> Result<()> {
    writeln!(out, "{} {}", entry.id(), entry.name)?;
    writeln!(out, "Services:")?;
    for service in entry.accessory.services() {
        writeln!(out, "    Service Type: {}", service.kind())?;
        writeln!(out, "    Characteristics: ")?;
        for characteristic in service.characteristics() {
            writeln!(out, "      : {}", characteristic.kind())?;
        }
    }
    writeln!(out)?;
    Ok(())
}

fn print_usage<W: Write>(out: &mut W) -> Result<()> {
    for usage in usages() {
        writeln!(out, "Usage: {usage}")?;
    }
    Ok(())
}
