mod codec;
mod events;
mod filters;
mod query;
mod relations;
