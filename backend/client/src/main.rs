use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{Bell, ClaimError, HttpApi, Session, Silent, board::render_leaderboard};
use shared::{DEFAULT_LEADERBOARD_LIMIT, Handle};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin, stdin};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the pop server.
    #[arg(long, env = "POPDOG_URL", default_value = "http://localhost:1111")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pop interactively, then claim your pops.
    Play {
        #[arg(long, env = "POPDOG_HANDLE")]
        handle: Option<String>,

        /// Send claims without a claim id.
        #[arg(long)]
        no_claim_id: bool,

        /// No bell on pop.
        #[arg(long)]
        quiet: bool,
    },

    Register {
        handle: String,
    },

    Total {
        handle: String,
    },

    Leaderboard {
        #[arg(long, default_value_t = DEFAULT_LEADERBOARD_LIMIT)]
        limit: usize,
    },

    /// One rate-limited pop sent straight to the server.
    Pop {
        handle: String,
    },

    /// Wipe the leaderboard.
    Reset {
        #[arg(long, env = "ADMIN_RESET_SECRET")]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let api = HttpApi::new(&args.url);

    match args.command {
        Command::Play {
            handle,
            no_claim_id,
            quiet,
        } => play(api, handle.as_deref(), no_claim_id, quiet).await?,
        Command::Register { handle } => {
            let handle = Handle::parse(&handle)?;
            let registered = client::PopApi::register(&api, &handle).await?;
            println!("Registered @{}", registered.handle);
        }
        Command::Total { handle } => {
            let handle = Handle::parse(&handle)?;
            let total = client::PopApi::total(&api, &handle).await?;
            println!("@{handle}: {total} pops");
        }
        Command::Leaderboard { limit } => {
            let entries = api.leaderboard(limit).await?;
            print!("{}", render_leaderboard(&entries));
            if entries.is_empty() {
                println!();
            }
        }
        Command::Pop { handle } => {
            let handle = Handle::parse(&handle)?;
            let popped = api.pop(&handle).await?;
            println!("@{}: {} pops", popped.handle, popped.total);
        }
        Command::Reset { secret } => {
            let reset = api.reset(&secret).await?;
            println!("{}", reset.message);
        }
    }

    Ok(())
}

async fn play(api: HttpApi, handle: Option<&str>, no_claim_id: bool, quiet: bool) -> Result<()> {
    let handle = handle.map(Handle::parse).transpose()?;

    let mut session = Session::open(api, handle)
        .await
        .context("Failed to load your total")?;
    session = if quiet {
        session.with_sound(Silent)
    } else {
        session.with_sound(Bell)
    };
    if no_claim_id {
        session = session.without_claim_ids();
    }

    println!("Enter: pop | c: claim | t: total | l: leaderboard | q: quit");
    print_score(&session);

    let mut lines = BufReader::new(stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {
                session.pop();
                print_score(&session);
            }
            "c" => claim(&mut session, &mut lines).await?,
            "t" => match session.refresh_total().await {
                Ok(_) => print_score(&session),
                Err(e) => println!("Failed to load your total: {e}"),
            },
            "l" => match session.api().leaderboard(DEFAULT_LEADERBOARD_LIMIT).await {
                Ok(entries) => println!("{}", render_leaderboard(&entries)),
                Err(e) => println!("Failed to load the leaderboard: {e}"),
            },
            "q" => break,
            other => println!("Unknown command {other:?}"),
        }
    }

    if session.pops() > 0 {
        warn!("Leaving with {} unclaimed pops, they are discarded", session.pops());
    }

    Ok(())
}

async fn claim(session: &mut Session<HttpApi>, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    let entered = if session.handle().is_none() && session.pops() > 0 {
        println!("Enter your X handle to save your score to the leaderboard:");

        match lines.next_line().await? {
            Some(line) if !line.trim().is_empty() => Some(line.trim().to_string()),
            _ => return Ok(()),
        }
    } else {
        None
    };

    match session.claim(entered.as_deref()).await {
        Ok(outcome) => {
            let handle = session.handle().map(Handle::as_str).unwrap_or_default();
            if outcome.duplicate {
                println!("Those pops were already saved for @{handle}.");
            } else {
                println!("Successfully submitted {} pops to @{handle}!", outcome.pops);
            }
            print_score(session);
        }
        Err(ClaimError::NothingToClaim) => println!("No local pops to submit!"),
        Err(e) => println!("{e}"),
    }

    Ok(())
}

fn print_score(session: &Session<HttpApi>) {
    if session.pops() > 0 {
        println!("Local Pops {} (not saved)", session.pops());
    } else if session.handle().is_some() && session.total() > 0 {
        println!("Leaderboard Score {}", session.total());
    } else {
        println!("Total Pops 0");
    }
}
