//! Role-gated navigation.
//!
//! Two layers, kept separate on purpose: the capability table decides which links
//! are shown (a guest sees everything), and page guards decide whether a signed-in
//! user may stay on a page reached directly.

use std::fmt;
use std::str::FromStr;

use crate::identity::{AuthSnapshot, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub browse_talent: bool,
    pub browse_jobs: bool,
    pub post_job: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        let client_side = matches!(role, Role::Client | Role::Admin | Role::Both | Role::Guest);
        let freelancer_side = matches!(role, Role::Freelancer | Role::Admin | Role::Both | Role::Guest);
        Self { browse_talent: client_side, browse_jobs: freelancer_side, post_job: client_side }
    }

    pub fn for_session(snapshot: &AuthSnapshot) -> Self { Self::for_role(snapshot.role()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Home,
    BrowseTalent,
    Jobs,
    PostJob,
    SignIn,
    SignUp,
    EgovCallback,
    Profile,
}

impl Page {
    pub const ALL: [Page; 8] = [
        Page::Home,
        Page::BrowseTalent,
        Page::Jobs,
        Page::PostJob,
        Page::SignIn,
        Page::SignUp,
        Page::EgovCallback,
        Page::Profile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::BrowseTalent => "/browse",
            Page::Jobs => "/jobs",
            Page::PostJob => "/post-job",
            Page::SignIn => "/signin",
            Page::SignUp => "/signup",
            Page::EgovCallback => "/auth/egov/callback",
            Page::Profile => "/profile",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.path()) }
}

impl FromStr for Page {
    type Err = String;

    /// Matches the path part only; query and trailing slash are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.split(['?', '#']).next().unwrap_or("");
        let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
        Page::ALL.into_iter().find(|p| p.path() == path).ok_or_else(|| format!("no route for '{}'", s))
    }
}

pub const NOTICE_JOBS: &str = "Only freelancers can browse jobs.";
pub const NOTICE_TALENT: &str = "Only clients can browse talent.";
pub const NOTICE_POST_JOB: &str = "Only clients can post jobs.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Session still validating; decide again once it settles.
    Wait,
    Redirect { to: Page, notice: Option<&'static str> },
}

/// Page-level check for a direct visit.
pub fn guard(page: Page, snapshot: &AuthSnapshot) -> GuardDecision {
    if snapshot.is_loading() {
        return GuardDecision::Wait;
    }
    let signed_in = snapshot.is_authenticated();
    let caps = Capabilities::for_session(snapshot);
    let deny = |notice| GuardDecision::Redirect { to: Page::Home, notice: Some(notice) };
    match page {
        Page::SignIn | Page::SignUp if signed_in => GuardDecision::Redirect { to: Page::Profile, notice: None },
        Page::Profile if !signed_in => GuardDecision::Redirect { to: Page::SignIn, notice: None },
        Page::Jobs if signed_in && !caps.browse_jobs => deny(NOTICE_JOBS),
        Page::BrowseTalent if signed_in && !caps.browse_talent => deny(NOTICE_TALENT),
        Page::PostJob if signed_in && !caps.post_job => deny(NOTICE_POST_JOB),
        _ => GuardDecision::Allow,
    }
}

/// Navigation links visible for the session, in menu order.
pub fn visible_links(snapshot: &AuthSnapshot) -> Vec<Page> {
    let caps = Capabilities::for_session(snapshot);
    let mut links = vec![Page::Home];
    if caps.browse_talent {
        links.push(Page::BrowseTalent);
    }
    if caps.browse_jobs {
        links.push(Page::Jobs);
    }
    if caps.post_job {
        links.push(Page::PostJob);
    }
    if snapshot.is_authenticated() {
        links.push(Page::Profile);
    } else {
        links.extend([Page::SignIn, Page::SignUp]);
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AuthStatus, User};

    fn signed_in(role: Option<Role>) -> AuthSnapshot {
        AuthSnapshot { status: AuthStatus::Authenticated, user: Some(User { role, ..User::new("u1") }), freelancer: None }
    }

    fn signed_out() -> AuthSnapshot { AuthSnapshot { status: AuthStatus::Unauthenticated, user: None, freelancer: None } }

    #[test]
    fn capability_table() {
        let all = Capabilities { browse_talent: true, browse_jobs: true, post_job: true };
        assert_eq!(Capabilities::for_role(Role::Freelancer), Capabilities { browse_talent: false, browse_jobs: true, post_job: false });
        assert_eq!(Capabilities::for_role(Role::Client), Capabilities { browse_talent: true, browse_jobs: false, post_job: true });
        assert_eq!(Capabilities::for_role(Role::Both), all);
        assert_eq!(Capabilities::for_role(Role::Admin), all);
        assert_eq!(Capabilities::for_role(Role::Guest), all);
        assert_eq!(Capabilities::for_session(&signed_in(None)), all);
    }

    #[test]
    fn client_is_bounced_from_jobs() {
        let d = guard(Page::Jobs, &signed_in(Some(Role::Client)));
        assert_eq!(d, GuardDecision::Redirect { to: Page::Home, notice: Some(NOTICE_JOBS) });
        assert_eq!(guard(Page::Jobs, &signed_in(Some(Role::Freelancer))), GuardDecision::Allow);
        assert_eq!(guard(Page::Jobs, &signed_out()), GuardDecision::Allow);
    }

    #[test]
    fn freelancer_is_bounced_from_client_pages() {
        let s = signed_in(Some(Role::Freelancer));
        assert!(matches!(guard(Page::PostJob, &s), GuardDecision::Redirect { to: Page::Home, .. }));
        assert!(matches!(guard(Page::BrowseTalent, &s), GuardDecision::Redirect { to: Page::Home, .. }));
    }

    #[test]
    fn auth_pages() {
        assert_eq!(guard(Page::Profile, &signed_out()), GuardDecision::Redirect { to: Page::SignIn, notice: None });
        assert_eq!(guard(Page::SignIn, &signed_in(Some(Role::Client))), GuardDecision::Redirect { to: Page::Profile, notice: None });
        let loading = AuthSnapshot { status: AuthStatus::Loading, user: None, freelancer: None };
        assert_eq!(guard(Page::Profile, &loading), GuardDecision::Wait);
    }

    #[test]
    fn route_parsing_and_links() {
        assert_eq!("/jobs/?q=rust".parse::<Page>().unwrap(), Page::Jobs);
        assert_eq!("/".parse::<Page>().unwrap(), Page::Home);
        assert!("/tests".parse::<Page>().is_err());
        let links = visible_links(&signed_in(Some(Role::Freelancer)));
        assert_eq!(links, vec![Page::Home, Page::Jobs, Page::Profile]);
        assert_eq!(visible_links(&signed_out()).len(), 6);
    }
}
