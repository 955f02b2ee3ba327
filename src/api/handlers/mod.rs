mod content;
mod health;
mod images;

pub use content::serve_image;
pub use health::{health, HealthResponse};
pub use images::{
    delete_image, get_image, list_images, update_image, upload_image, ImageResponse,
    UpdateImageRequest,
};
