// Std
use std::env;

// Crates
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{crate_version, value_parser, Arg, Command};
use dotenv::dotenv;
use prettytable::{row, Table};
use reqwest::{Client, Response, Url};

// Local
use workhours::api::ErrorBody;
use workhours::db::Entry;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let base_url = env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let base_url = base_url.trim_end_matches('/');

    let client = Client::new();
    let today = Local::now().date_naive();

    let matches = Command::new("workhours")
        .version(crate_version!())
        .author("Samuel Vanderwaal")
        .about("Record hours worked per day.")
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List all entries, newest first."))
        .subcommand(
            Command::new("add")
                .about("Record hours for a date. Replaces any hours already recorded for it.")
                .arg(
                    Arg::new("date")
                        .required(true)
                        .help("YYYY-MM-DD, or today/yesterday/tomorrow."),
                )
                .arg(
                    Arg::new("hours")
                        .required(true)
                        .value_parser(value_parser!(f64))
                        .help("Hours worked."),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete the entry for a date.")
                .arg(
                    Arg::new("date")
                        .required(true)
                        .help("YYYY-MM-DD, or today/yesterday/tomorrow."),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("list", _)) => {
            let entries = list_entries(base_url, &client).await?;
            entries_table(&entries).printstd();
        }
        Some(("add", args)) => {
            let date = args.get_one::<String>("date").context("date is required")?;
            let hours = *args.get_one::<f64>("hours").context("hours is required")?;

            let entry = add_entry(base_url, &client, &resolve_date(date, today), hours).await?;
            println!("Recorded {} hours for {}.", entry.hours, entry.date);
        }
        Some(("delete", args)) => {
            let date = args.get_one::<String>("date").context("date is required")?;
            let date = resolve_date(date, today);

            delete_entry(base_url, &client, &date).await?;
            println!("Entry for {} deleted.", date);
        }
        Some((other, _)) => return Err(anyhow!("Unknown command: {}", other)),
        None => return Err(anyhow!("No command given")),
    }

    Ok(())
}

async fn list_entries(base_url: &str, client: &Client) -> Result<Vec<Entry>> {
    let url = format!("{}/api/entries", base_url);
    let res = check_status(client.get(&url).send().await?).await?;

    Ok(res.json::<Vec<Entry>>().await?)
}

async fn add_entry(base_url: &str, client: &Client, date: &str, hours: f64) -> Result<Entry> {
    let url = format!("{}/api/entries", base_url);
    let new_entry = Entry {
        date: date.to_string(),
        hours,
    };
    let res = check_status(client.post(&url).json(&new_entry).send().await?).await?;

    // The reply echoes the accepted entry next to `success`.
    Ok(res.json::<Entry>().await?)
}

async fn delete_entry(base_url: &str, client: &Client, date: &str) -> Result<()> {
    let url = entry_url(base_url, date)?;
    check_status(client.delete(url).send().await?).await?;

    Ok(())
}

/// `{base_url}/api/entries/{date}` with `date` percent-encoded as one segment.
fn entry_url(base_url: &str, date: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).context("Invalid BASE_URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("BASE_URL cannot be a base URL: {}", base_url))?
        .pop_if_empty()
        .extend(&["api", "entries", date]);

    Ok(url)
}

async fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    match res.json::<ErrorBody>().await {
        Ok(body) => Err(anyhow!("Status code: {}: {}", status, body.error)),
        Err(_) => Err(anyhow!("Status code: {}", status)),
    }
}

fn resolve_date(value: &str, today: NaiveDate) -> String {
    let date = match value {
        "today" => today,
        "yesterday" => today - Duration::days(1),
        "tomorrow" => today + Duration::days(1),
        _ => return value.to_string(),
    };

    date.format("%Y-%m-%d").to_string()
}

fn entries_table(entries: &[Entry]) -> Table {
    let mut table = Table::new();
    table.add_row(row![Fb => "Date", "Hours"]);

    for entry in entries {
        table.add_row(row![entry.date, entry.hours]);
    }

    let total: f64 = entries.iter().map(|e| e.hours).sum();
    table.add_row(row![Fb => "Total", total]);

    table
}
