use warden_core::{Context, Error};

use crate::dispatch::forward;

/// List commands or explain one of them.
#[poise::command(prefix_command, slash_command, category = "Utility")]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Command name"]
    #[rest]
    args: Option<String>,
) -> Result<(), Error> {
    forward(ctx, "help", args).await
}
