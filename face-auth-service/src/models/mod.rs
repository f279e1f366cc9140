pub mod descriptor;
pub mod user;

pub use descriptor::FaceDescriptor;
pub use user::User;
