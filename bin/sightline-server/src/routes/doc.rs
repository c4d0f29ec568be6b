use crate::routes::{health, v1};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "sightline-server",
    description = "Camera timeline: photo descriptions, change deltas and chat",
    version = "0.1.0",
    contact(name = "sightline-rs", url = "https://github.com/sightline-rs/sightline")
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}
