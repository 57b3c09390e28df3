//! Identity and session state for the marketplace client.
//! Keep the public surface thin and split implementation across sub-modules.

mod account;
mod models;
mod role;
mod session;
pub mod validation;

pub use account::{register, sign_in, LOGIN_PATH, REGISTER_PATH};
pub use models::{Education, FreelancerPatch, FreelancerProfile, ProfileEnvelope, User, UserPatch, WorkExperience};
pub use role::Role;
pub use session::{
    AuthSession, AuthSnapshot, AuthStatus, EDUCATION_PATH, EXPERIENCE_PATH, HEADER_USER_ID, PROFILE_PATH, SKILLS_PATH, XP_PATH,
};
pub use validation::{SignInForm, SignUpForm};
