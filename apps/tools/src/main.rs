use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use query_codec::{CipherKind, CodecConfig, QueryCodec, QuerySecret};
use query_state::{page::PageAction, HashedQuery, Location, MemoryHistory, NavigationHost};
use shared::domain::{default_query_state, QueryState};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Secret for the sealed cipher; blank uses the built-in fallback.
    #[arg(long, env = "QUERY_SECRET")]
    secret: Option<String>,
    #[arg(long, env = "APP__QUERY_CIPHER", default_value = "passthrough")]
    cipher: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a JSON object into a `q` token.
    Encode { json: String },
    /// Decode a `q` token (or a full URL carrying one) back into JSON.
    Decode { token: String },
    /// Replay page actions against an in-memory history, printing each step.
    Session {
        #[arg(long, default_value = "/")]
        start: String,
        steps: Vec<SessionStep>,
    },
}

#[derive(Debug, Clone, Copy)]
enum SessionStep {
    Action(PageAction),
    Back,
    Forward,
}

impl FromStr for SessionStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "back" => Ok(Self::Back),
            "forward" => Ok(Self::Forward),
            other => Ok(Self::Action(other.parse()?)),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let cipher: CipherKind = cli.cipher.parse()?;
    let codec = QueryCodec::from_config(&CodecConfig {
        secret: QuerySecret::from_optional(cli.secret.as_deref()),
        cipher,
    })
    .context("failed to build query codec")?;

    match cli.command {
        Command::Encode { json } => {
            let state: QueryState = serde_json::from_str(&json)
                .context("state must be a flat JSON object of numbers and strings")?;
            println!("{}", codec.encode(&state)?);
        }
        Command::Decode { token } => {
            let token = if token.contains('?') {
                Location::parse(&token)?.token.unwrap_or_default()
            } else {
                token
            };
            let state = codec
                .decode::<QueryState>(&token)
                .ok_or_else(|| anyhow!("token did not decode"))?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Session { start, steps } => run_session(codec, &start, &steps)?,
    }

    Ok(())
}

fn run_session(codec: QueryCodec, start: &str, steps: &[SessionStep]) -> Result<()> {
    let history = MemoryHistory::new(start)?;
    let mut query = HashedQuery::new(history.clone(), codec, default_query_state())?;
    print_step("start", &history, query.state())?;

    for step in steps {
        let label = match step {
            SessionStep::Action(action) => {
                if !action.apply(&mut query)? {
                    println!("{:>12}  (disabled)", action.to_string());
                    continue;
                }
                action.to_string()
            }
            SessionStep::Back => {
                if !history.back() {
                    println!("{:>12}  (start of history)", "back");
                    continue;
                }
                query.sync_pending();
                "back".to_string()
            }
            SessionStep::Forward => {
                if !history.forward() {
                    println!("{:>12}  (end of history)", "forward");
                    continue;
                }
                query.sync_pending();
                "forward".to_string()
            }
        };
        print_step(&label, &history, query.state())?;
    }

    println!(
        "history: {} entries, {} pushes, {} replaces",
        history.len(),
        history.push_count(),
        history.replace_count()
    );
    Ok(())
}

fn print_step(label: &str, history: &MemoryHistory, state: &QueryState) -> Result<()> {
    println!(
        "{label:>12}  {:<48}  {}",
        history.location().url(),
        serde_json::to_string(state)?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::FilterKey;

    #[test]
    fn session_steps_parse() {
        assert!(matches!("back".parse::<SessionStep>(), Ok(SessionStep::Back)));
        assert!(matches!(
            "brand".parse::<SessionStep>(),
            Ok(SessionStep::Action(PageAction::ToggleFilter(FilterKey::Brand)))
        ));
        assert!("sideways".parse::<SessionStep>().is_err());
    }

    #[test]
    fn cli_accepts_session_steps() {
        let cli = Cli::try_parse_from(["tools", "session", "next", "flyout", "back"]).expect("cli");
        match cli.command {
            Command::Session { start, steps } => {
                assert_eq!(start, "/");
                assert_eq!(steps.len(), 3);
                run_session(QueryCodec::default(), &start, &steps).expect("session");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
