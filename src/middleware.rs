mod internal;
mod ownership;

pub(crate) use self::{internal::Internal, ownership::Ownership};
