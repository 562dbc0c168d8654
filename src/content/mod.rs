mod article;
mod fields;
mod status;
mod user;

pub use self::{
    article::Article,
    fields::{ArticleFields, ArticleInput, FieldErrors},
    status::{ArticleStatus, StatusAction, UnknownValue},
    user::{CurrentUser, Role},
};
