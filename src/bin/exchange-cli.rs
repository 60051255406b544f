#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading and sending Exchange Online mail

use clap::{Parser, Subcommand};
use exchange_mail::{
    AttachmentSource, CancellationToken, Connection, EwsMessage, EwsReadOptions, EwsSettings,
    FileExistPolicy, HeaderParameter, Importance, MessageQuery, MessageRecord, ReadInput,
    ReadOptions, SendInput, SendOptions,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exchange-cli")]
#[command(about = "Read and send Exchange Online mail via Microsoft Graph or EWS")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Read messages through Microsoft Graph
    Read {
        /// Mailbox to read (default: the signed-in user)
        #[arg(long, default_value = "")]
        from: String,

        /// OData filter, e.g. "isRead eq false"
        #[arg(long, default_value = "")]
        filter: String,

        /// Properties to return, comma separated
        #[arg(long, default_value = "")]
        select: String,

        /// Sort keys, comma separated
        #[arg(long, default_value = "")]
        orderby: String,

        /// Related entities to expand, comma separated
        #[arg(long, default_value = "")]
        expand: String,

        #[arg(long)]
        skip: Option<u32>,

        /// Maximum number of messages (0 = all)
        #[arg(long, default_value = "20")]
        top: u32,

        /// Extra request header as NAME=VALUE (repeatable)
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Download attachments into this directory
        #[arg(long)]
        download: Option<PathBuf>,

        /// Create the download directory if missing
        #[arg(long)]
        create_dir: bool,

        /// What to do when a downloaded file exists
        #[arg(long, default_value = "Skip")]
        on_exists: FileExistPolicy,

        /// Leave messages unread
        #[arg(long)]
        keep_unread: bool,

        /// Collect per-message errors instead of stopping
        #[arg(long)]
        keep_going: bool,

        /// Fail when no message matches
        #[arg(long)]
        fail_if_empty: bool,
    },

    /// Send a message through Microsoft Graph
    Send {
        /// Sending mailbox (default: the signed-in user)
        #[arg(long, default_value = "")]
        from: String,

        /// Recipients separated by ',' or ';'
        #[arg(long)]
        to: String,

        #[arg(long, default_value = "")]
        cc: String,

        #[arg(long, default_value = "")]
        bcc: String,

        #[arg(long, default_value = "")]
        subject: String,

        /// Message body
        #[arg(long, default_value = "")]
        body: String,

        /// Send the body as HTML
        #[arg(long)]
        html: bool,

        #[arg(long, default_value = "normal")]
        importance: Importance,

        /// Do not keep a copy in Sent Items
        #[arg(long)]
        no_save: bool,

        /// File or directory to attach (repeatable)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,

        /// File mask applied to attached directories
        #[arg(long, default_value = "*")]
        mask: String,

        /// Fail when an attachment path matches no file
        #[arg(long)]
        strict_attachments: bool,

        /// Report failure in the output instead of exiting with an error
        #[arg(long)]
        keep_going: bool,
    },

    /// Read inbox messages from a legacy EWS endpoint
    EwsRead {
        /// Maximum number of messages
        #[arg(long, default_value = "10")]
        max: u32,

        #[arg(long)]
        unread: bool,

        #[arg(long)]
        mark_read: bool,

        /// Hard-delete messages after reading
        #[arg(long)]
        delete: bool,

        /// Exact sender address
        #[arg(long, default_value = "")]
        sender: String,

        /// Subject substring
        #[arg(long, default_value = "")]
        subject: String,

        /// Save attachments into this directory
        #[arg(long)]
        attachments_dir: Option<PathBuf>,

        #[arg(long)]
        only_with_attachments: bool,

        #[arg(long, default_value = "Rename")]
        on_exists: FileExistPolicy,

        #[arg(long)]
        fail_if_empty: bool,
    },
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("Invalid header '{s}', expected NAME=VALUE"))
}

/// Group repeated `--header` values by name, keeping first-seen order.
fn header_parameters(headers: &[(String, String)]) -> Vec<HeaderParameter> {
    let mut grouped: Vec<HeaderParameter> = Vec::new();
    for (name, value) in headers {
        match grouped.iter_mut().find(|h| h.name.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.values.push(value.clone()),
            None => grouped.push(HeaderParameter::new(name.clone(), [value.clone()])),
        }
    }
    grouped
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match args.command {
        Command::Read {
            from,
            filter,
            select,
            orderby,
            expand,
            skip,
            top,
            headers,
            download,
            create_dir,
            on_exists,
            keep_unread,
            keep_going,
            fail_if_empty,
        } => {
            let input = ReadInput {
                from,
                query: MessageQuery {
                    select,
                    filter,
                    skip,
                    top,
                    orderby,
                    expand,
                    headers: header_parameters(&headers),
                },
                download_attachments: download.is_some(),
                destination_directory: download
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
                create_directory: create_dir,
                file_exist_policy: on_exists,
                update_read_status: !keep_unread,
            };
            let options = ReadOptions {
                throw_on_failure: !keep_going,
                throw_if_no_messages_found: fail_if_empty,
            };
            cmd_read(args.json, &input, &options, cancel).await
        }
        Command::Send {
            from,
            to,
            cc,
            bcc,
            subject,
            body,
            html,
            importance,
            no_save,
            attachments,
            mask,
            strict_attachments,
            keep_going,
        } => {
            let input = SendInput {
                from,
                to,
                cc,
                bcc,
                subject,
                message: body,
                is_message_html: html,
                importance,
                save_to_sent_items: !no_save,
                attachments: attachments
                    .into_iter()
                    .map(|path| AttachmentSource::directory(path, mask.clone()))
                    .collect(),
            };
            let options = SendOptions {
                throw_on_failure: !keep_going,
                throw_if_attachment_not_found: strict_attachments,
            };
            cmd_send(args.json, &input, &options, cancel).await
        }
        Command::EwsRead {
            max,
            unread,
            mark_read,
            delete,
            sender,
            subject,
            attachments_dir,
            only_with_attachments,
            on_exists,
            fail_if_empty,
        } => {
            let options = EwsReadOptions {
                max_emails: max,
                only_unread: unread,
                mark_as_read: mark_read,
                delete_read: delete,
                sender_filter: sender,
                subject_filter: subject,
                throw_if_no_messages_found: fail_if_empty,
                ignore_attachments: attachments_dir.is_none(),
                only_with_attachments,
                attachment_directory: attachments_dir
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
                file_exist_policy: on_exists,
            };
            cmd_ews_read(args.json, &options, cancel).await
        }
    }
}

async fn cmd_read(
    json: bool,
    input: &ReadInput,
    options: &ReadOptions,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let connection = Connection::from_env()?;
    let result = exchange_mail::read_email(&connection, input, options, cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_message_table(&result.data);
        for error in &result.error_messages {
            eprintln!("error: {error}");
        }
    }

    Ok(())
}

async fn cmd_send(
    json: bool,
    input: &SendInput,
    options: &SendOptions,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let connection = Connection::from_env()?;
    let result = exchange_mail::send_email(&connection, input, options, cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.data);
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_ews_read(
    json: bool,
    options: &EwsReadOptions,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let settings = EwsSettings::from_env()?;
    let messages = exchange_mail::read_ews_email(&settings, options, cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        print_ews_table(&messages);
    }

    Ok(())
}

fn print_message_table(messages: &[MessageRecord]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    println!("{:<20} {:<30} {:<6} {}", "Received", "From", "Files", "Subject");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<20} {:<30} {:<6} {}",
            message
                .received
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            truncate(message.from.as_deref().unwrap_or("-"), 28),
            message.attachments.len(),
            truncate(message.subject.as_deref().unwrap_or(""), 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn print_ews_table(messages: &[EwsMessage]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    println!("{:<20} {:<30} {:<6} {}", "Date", "From", "Files", "Subject");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<20} {:<30} {:<6} {}",
            message
                .date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            truncate(&message.from, 28),
            message.attachment_paths.len(),
            truncate(&message.subject, 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
