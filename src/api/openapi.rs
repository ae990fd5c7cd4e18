//! OpenAPI document of the puppies API.

use utoipa::OpenApi;

use crate::api::dto::PuppyDto;
use crate::api::handlers::{puppy, system};
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI documentation for the puppies demo.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "txgate puppies",
        description = "Demo application whose every request runs inside one database transaction"
    ),
    paths(
        puppy::create_puppy,
        puppy::list_puppies,
        system::health_handler,
    ),
    components(schemas(PuppyDto, ErrorResponse, ErrorBody)),
    tags(
        (name = "Puppies", description = "Transactional puppy storage"),
        (name = "System", description = "Health and metadata")
    )
)]
#[derive(Debug)]
pub struct ApiDoc;
