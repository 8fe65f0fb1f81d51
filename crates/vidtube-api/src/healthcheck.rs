use crate::response::ApiResponse;

pub async fn healthcheck() -> ApiResponse<()> {
    ApiResponse::ok((), "OK")
}
