use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::info;

use crate::notifications::{format_time_ago, SharedNotificationStore};

#[derive(Subcommand, Debug)]
pub enum NotificationCommand {
    /// List notifications, newest first
    List,
    /// Mark one notification read
    Read { id: i64 },
    /// Mark every notification read
    ReadAll,
    /// Delete all notifications
    Clear,
    /// Create a notification
    Create {
        message: String,
        #[arg(long)]
        task_id: Option<i64>,
    },
    /// Poll the server and print the unread count when it changes
    Watch,
}

fn print_list(store: &SharedNotificationStore) {
    let items = store.notifications();
    if items.is_empty() {
        println!("No notifications");
        return;
    }
    let now = Utc::now();
    for n in items {
        let marker = if n.read { " " } else { "*" };
        println!(
            "{} #{:<5} {:<50} {}",
            marker,
            n.id,
            n.message,
            format_time_ago(n.created_at, now)
        );
    }
    println!("{} unread", store.unread_count());
}

pub async fn run_notifications(
    store: &SharedNotificationStore,
    command: NotificationCommand,
    poll_interval: std::time::Duration,
) -> Result<()> {
    match command {
        NotificationCommand::List => {
            store.refresh().await?;
            print_list(store);
        }
        NotificationCommand::Read { id } => {
            store.refresh().await?;
            store.mark_read(id).await?;
            println!("{} unread", store.unread_count());
        }
        NotificationCommand::ReadAll => {
            store.refresh().await?;
            store.mark_all_read().await?;
            println!("{} unread", store.unread_count());
        }
        NotificationCommand::Clear => {
            store.clear_all().await?;
            println!("Notifications cleared");
        }
        NotificationCommand::Create { message, task_id } => {
            let created = store.create(&message, task_id).await?;
            println!("Created notification #{}", created.id);
        }
        NotificationCommand::Watch => {
            let poll = store.spawn_poll_loop(poll_interval);
            let mut unread = WatchStream::new(store.subscribe_unread());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    next = unread.next() => match next {
                        Some(count) => println!("{} unread", count),
                        None => break,
                    },
                }
            }
            info!("Stopping notification watch");
            poll.stop().await;
        }
    }
    Ok(())
}
