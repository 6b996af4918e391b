//! Capability resolution.
//!
//! Effective permissions are a pure function of the caller's site role and their
//! membership role in the club being acted on. Handlers load a [`ClubAccess`] once per
//! request and ask it questions; nothing in here touches the database except
//! [`ClubAccess::load`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Club, ClubMember, ClubRole, ClubVisibility, SiteRole, text_enum},
    repository::Repository,
};

text_enum! {
    /// Capability
    ///
    /// Named permission checked by handlers. The string form is stable and is what
    /// the client sees in capability listings.
    pub enum Capability {
        ClubViewContent => "club:view_content",
        ClubEdit => "club:edit",
        ClubDelete => "club:delete",
        MemberManageRoles => "member:manage_roles",
        MemberRemove => "member:remove",
        MemberBan => "member:ban",
        JoinRequestReview => "join_request:review",
        ContentModerate => "content:moderate",
        PostCreate => "post:create",
        CommentCreate => "comment:create",
        ReactionCreate => "reaction:create",
        EventCreate => "event:create",
        EventManage => "event:manage",
        EventAttend => "event:attend",
        ChallengeCreate => "challenge:create",
        ChallengeManage => "challenge:manage",
        ChallengeParticipate => "challenge:participate",
        AuditView => "audit:view",
    }
}

impl Capability {
    pub const ALL: [Capability; 18] = [
        Capability::ClubViewContent,
        Capability::ClubEdit,
        Capability::ClubDelete,
        Capability::MemberManageRoles,
        Capability::MemberRemove,
        Capability::MemberBan,
        Capability::JoinRequestReview,
        Capability::ContentModerate,
        Capability::PostCreate,
        Capability::CommentCreate,
        Capability::ReactionCreate,
        Capability::EventCreate,
        Capability::EventManage,
        Capability::EventAttend,
        Capability::ChallengeCreate,
        Capability::ChallengeManage,
        Capability::ChallengeParticipate,
        Capability::AuditView,
    ];
}

const MEMBER_CAPABILITIES: &[Capability] = &[
    Capability::ClubViewContent,
    Capability::PostCreate,
    Capability::CommentCreate,
    Capability::ReactionCreate,
    Capability::EventAttend,
    Capability::ChallengeParticipate,
];

const MODERATOR_CAPABILITIES: &[Capability] = &[
    Capability::MemberRemove,
    Capability::MemberBan,
    Capability::JoinRequestReview,
    Capability::ContentModerate,
    Capability::EventCreate,
    Capability::EventManage,
    Capability::ChallengeCreate,
    Capability::ChallengeManage,
];

/// can
///
/// Site `ADMIN`/`SUPER_ADMIN` hold every capability. Otherwise the club role decides:
/// members get the participation set, moderators add the moderation set, club admins
/// get everything except `club:delete`, which only the creator (checked separately)
/// or a site admin may do.
pub fn can(site_role: SiteRole, club_role: Option<ClubRole>, capability: Capability) -> bool {
    if site_role.is_site_admin() {
        return true;
    }
    match club_role {
        None => false,
        Some(ClubRole::Admin) => capability != Capability::ClubDelete,
        Some(ClubRole::Moderator) => {
            MEMBER_CAPABILITIES.contains(&capability)
                || MODERATOR_CAPABILITIES.contains(&capability)
        }
        Some(ClubRole::Member) => MEMBER_CAPABILITIES.contains(&capability),
    }
}

/// Same as [`can`] but takes the capability by name. Unknown names are denied.
pub fn can_by_name(site_role: SiteRole, club_role: Option<ClubRole>, capability: &str) -> bool {
    Capability::from_str(capability)
        .map(|cap| can(site_role, club_role, cap))
        .unwrap_or(false)
}

/// Every capability granted to the pair, in declaration order.
pub fn granted(site_role: SiteRole, club_role: Option<ClubRole>) -> Vec<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|cap| can(site_role, club_role, *cap))
        .collect()
}

/// outranks
///
/// Whether an actor may act on a member holding `target_role` (kick, ban, demote).
/// Site admins outrank everyone; otherwise the actor's club role must be strictly higher.
pub fn outranks(actor_site: SiteRole, actor_club: Option<ClubRole>, target_role: ClubRole) -> bool {
    if actor_site.is_site_admin() {
        return true;
    }
    actor_club.is_some_and(|role| role.rank() > target_role.rank())
}

/// ClubAccess
///
/// Everything a handler needs to authorize an action against one club: the club row,
/// who is asking, and their membership (if any).
#[derive(Debug, Clone)]
pub struct ClubAccess {
    pub club: Club,
    pub user_id: Option<String>,
    pub site_role: SiteRole,
    pub membership: Option<ClubMember>,
}

/// Serializable capability listing returned alongside club details.
#[derive(Debug, Clone, Serialize, Deserialize, ts_rs::TS, utoipa::ToSchema)]
#[ts(export)]
pub struct ViewerPermissions {
    pub club_id: Uuid,
    pub role: Option<ClubRole>,
    pub is_creator: bool,
    pub capabilities: Vec<Capability>,
}

impl ClubAccess {
    /// Loads the club and the viewer's membership. Missing club → `NOT_FOUND`.
    pub async fn load(
        repo: &dyn Repository,
        club_id: Uuid,
        viewer: Option<&AuthUser>,
    ) -> AppResult<Self> {
        let club = repo
            .get_club(club_id)
            .await?
            .ok_or_else(|| AppError::not_found("club"))?;

        let membership = match viewer {
            Some(user) => repo.get_member(club_id, &user.id).await?,
            None => None,
        };

        Ok(Self {
            club,
            user_id: viewer.map(|u| u.id.clone()),
            site_role: viewer.map(|u| u.site_role).unwrap_or_default(),
            membership,
        })
    }

    pub fn role(&self) -> Option<ClubRole> {
        self.membership.as_ref().map(|m| m.role)
    }

    pub fn is_member(&self) -> bool {
        self.membership.is_some()
    }

    pub fn is_creator(&self) -> bool {
        self.user_id.as_deref() == Some(self.club.created_by.as_str())
    }

    pub fn can(&self, capability: Capability) -> bool {
        // Anonymous callers never hold capabilities, whatever the default site role says.
        self.user_id.is_some() && can(self.site_role, self.role(), capability)
    }

    /// `FORBIDDEN` unless the viewer holds `capability`.
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "missing capability {capability}"
            )))
        }
    }

    /// Public club content is readable by anyone; private content needs membership
    /// (or a site role override).
    pub fn can_view_content(&self) -> bool {
        self.club.visibility == ClubVisibility::Public || self.can(Capability::ClubViewContent)
    }

    pub fn require_view_content(&self) -> AppResult<()> {
        if self.can_view_content() {
            Ok(())
        } else {
            Err(AppError::forbidden("this club's content is visible to members only"))
        }
    }

    /// Whether the viewer may act on `target` (kick, ban, demote).
    /// The creator is untouchable except by site admins.
    pub fn can_act_on(&self, target: &ClubMember) -> bool {
        if self.user_id.as_deref() == Some(target.user_id.as_str()) {
            return false;
        }
        if target.user_id == self.club.created_by {
            return self.site_role.is_site_admin();
        }
        outranks(self.site_role, self.role(), target.role)
    }

    pub fn permissions(&self) -> ViewerPermissions {
        let capabilities = match self.user_id {
            Some(_) => {
                let mut caps = granted(self.site_role, self.role());
                if self.is_creator() && !caps.contains(&Capability::ClubDelete) {
                    caps.push(Capability::ClubDelete);
                }
                caps
            }
            None => Vec::new(),
        };
        ViewerPermissions {
            club_id: self.club.id,
            role: self.role(),
            is_creator: self.is_creator(),
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_admins_override_everything() {
        for cap in Capability::ALL {
            assert!(can(SiteRole::Admin, None, cap));
            assert!(can(SiteRole::SuperAdmin, Some(ClubRole::Member), cap));
        }
    }

    #[test]
    fn non_members_hold_nothing() {
        assert!(granted(SiteRole::User, None).is_empty());
    }

    #[test]
    fn club_admin_cannot_delete_club() {
        assert!(!can(SiteRole::User, Some(ClubRole::Admin), Capability::ClubDelete));
        assert!(can(SiteRole::User, Some(ClubRole::Admin), Capability::MemberManageRoles));
    }

    #[test]
    fn moderators_moderate_but_do_not_manage_roles() {
        let moderator = Some(ClubRole::Moderator);
        assert!(can(SiteRole::User, moderator, Capability::ContentModerate));
        assert!(can(SiteRole::User, moderator, Capability::MemberBan));
        assert!(!can(SiteRole::User, moderator, Capability::MemberManageRoles));
        assert!(!can(SiteRole::User, moderator, Capability::ClubEdit));
        assert!(!can(SiteRole::User, moderator, Capability::AuditView));
    }

    #[test]
    fn members_participate_only() {
        let member = Some(ClubRole::Member);
        assert!(can(SiteRole::User, member, Capability::PostCreate));
        assert!(can(SiteRole::User, member, Capability::EventAttend));
        assert!(!can(SiteRole::User, member, Capability::EventCreate));
        assert!(!can(SiteRole::User, member, Capability::ContentModerate));
    }

    #[test]
    fn capability_names_round_trip_and_unknown_is_denied() {
        assert!(can_by_name(SiteRole::User, Some(ClubRole::Member), "post:create"));
        assert!(!can_by_name(SiteRole::Admin, None, "post:launch_missiles"));
        assert_eq!(Capability::ClubEdit.to_string(), "club:edit");
    }

    #[test]
    fn rank_comparison_is_strict() {
        assert!(outranks(SiteRole::User, Some(ClubRole::Admin), ClubRole::Moderator));
        assert!(!outranks(SiteRole::User, Some(ClubRole::Moderator), ClubRole::Moderator));
        assert!(!outranks(SiteRole::User, None, ClubRole::Member));
        assert!(outranks(SiteRole::Admin, None, ClubRole::Admin));
    }
}
