use poise::serenity_prelude as serenity;

/// A guild member together with its resolved authority.
#[derive(Clone, Debug)]
pub struct MemberStanding {
    pub member: serenity::Member,
    /// Position of the member's highest role; the guild owner outranks everyone.
    pub rank: i64,
    pub permissions: serenity::Permissions,
    pub role_names: Vec<String>,
}

/// Resolve a member's effective guild permissions and role rank.
///
/// Returns `Ok(None)` when the user is not a member of the guild.
pub async fn resolve_member_standing(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> anyhow::Result<Option<MemberStanding>> {
    let member = match guild_id.member(http, user_id).await {
        Ok(member) => member,
        Err(source) if is_unknown_entity_error(&source) => return Ok(None),
        Err(source) => return Err(source.into()),
    };
    let guild = guild_id.to_partial_guild(http).await?;

    let everyone_role_id = serenity::RoleId::new(guild_id.get());
    let mut permissions = serenity::Permissions::empty();
    let mut rank = 0_i64;
    let mut held_roles = Vec::new();

    for role in guild.roles.values() {
        if role.id == everyone_role_id {
            permissions |= role.permissions;
            continue;
        }
        if member.roles.contains(&role.id) {
            permissions |= role.permissions;
            rank = rank.max(i64::from(role.position));
            held_roles.push((role.position, role.name.clone()));
        }
    }

    if guild.owner_id == user_id {
        permissions = serenity::Permissions::all();
        rank = i64::MAX;
    }

    held_roles.sort_unstable_by(|left, right| right.0.cmp(&left.0));
    let role_names = held_roles.into_iter().map(|(_, name)| name).collect();

    Ok(Some(MemberStanding {
        member,
        rank,
        permissions,
        role_names,
    }))
}

pub fn is_missing_permissions_error(source: &serenity::Error) -> bool {
    matches!(
        source,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 403 || response.error.code == 50013
    )
}

/// Unknown member / unknown user responses.
pub fn is_unknown_entity_error(source: &serenity::Error) -> bool {
    matches!(
        source,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
                || matches!(response.error.code, 10007 | 10013)
    )
}
