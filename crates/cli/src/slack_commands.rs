use clap::Subcommand;

use slackline_slack::{CredentialTier, Envelope, SlackTools, types::UserType};

#[derive(Subcommand)]
pub enum SlackAction {
    /// Verify the bot token (or the user token with `--user`).
    Test {
        #[arg(long)]
        user: bool,
    },
    /// Post a message to a channel.
    Send {
        #[arg(short, long)]
        channel: String,
        #[arg(short, long)]
        message: String,
        /// Reply in the thread rooted at this timestamp.
        #[arg(long)]
        thread_ts: Option<String>,
    },
    /// List channels the bot can see.
    Channels {
        #[arg(long)]
        include_archived: bool,
        /// Comma-separated conversation types.
        #[arg(long)]
        types: Option<String>,
    },
    /// Recent messages in a channel.
    History {
        channel: String,
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(long)]
        latest: Option<String>,
        #[arg(long)]
        oldest: Option<String>,
    },
    /// List workspace users.
    Users {
        #[arg(long)]
        include_bots: bool,
        #[arg(short, long)]
        limit: Option<u32>,
        /// Keep only these types (owner, admin, member, bot,
        /// single_channel_guest, multi_channel_guest).
        #[arg(long = "type")]
        user_types: Vec<UserType>,
    },
    /// Look a user up by email address.
    FindUser { email: String },
    /// Users that can receive a direct message.
    DmCandidates {
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Send a direct message to a user id.
    Dm {
        user: String,
        #[arg(short, long)]
        message: String,
    },
    /// Search messages (needs the user token).
    Search {
        query: String,
        #[arg(long, default_value = "timestamp")]
        sort: String,
        #[arg(long, default_value = "desc")]
        sort_dir: String,
        #[arg(long, default_value_t = 20)]
        count: u32,
    },
    /// Add an emoji reaction to a message.
    React {
        channel: String,
        timestamp: String,
        emoji: String,
    },
    /// Workspace identity, statistics and capabilities.
    Workspace,
}

pub async fn handle_slack(tools: &SlackTools, action: &SlackAction) -> Envelope {
    match action {
        SlackAction::Test { user } => {
            let tier = if *user {
                CredentialTier::Elevated
            } else {
                CredentialTier::Primary
            };
            tools.test_connection(tier).await
        },
        SlackAction::Send {
            channel,
            message,
            thread_ts,
        } => {
            tools
                .send_message(channel, message, thread_ts.as_deref())
                .await
        },
        SlackAction::Channels {
            include_archived,
            types,
        } => tools.list_channels(!include_archived, types.as_deref()).await,
        SlackAction::History {
            channel,
            limit,
            latest,
            oldest,
        } => {
            tools
                .channel_history(channel, *limit, latest.as_deref(), oldest.as_deref())
                .await
        },
        SlackAction::Users {
            include_bots,
            limit,
            user_types,
        } => {
            let types = (!user_types.is_empty()).then_some(user_types.as_slice());
            tools.list_users(*include_bots, *limit, types).await
        },
        SlackAction::FindUser { email } => tools.find_user_by_email(email).await,
        SlackAction::DmCandidates { limit } => tools.dm_candidates(*limit).await,
        SlackAction::Dm { user, message } => tools.send_direct_message(user, message).await,
        SlackAction::Search {
            query,
            sort,
            sort_dir,
            count,
        } => tools.search_messages(query, sort, sort_dir, *count).await,
        SlackAction::React {
            channel,
            timestamp,
            emoji,
        } => tools.add_reaction(channel, timestamp, emoji).await,
        SlackAction::Workspace => tools.workspace_info().await,
    }
}
