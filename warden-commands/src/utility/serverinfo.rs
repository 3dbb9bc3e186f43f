use warden_core::{Context, Error};

use crate::dispatch::forward;

/// Show information about this server.
#[poise::command(prefix_command, slash_command, category = "Information")]
pub async fn serverinfo(ctx: Context<'_>) -> Result<(), Error> {
    forward(ctx, "serverinfo", None).await
}
