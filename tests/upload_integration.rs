use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use playmat_builder::{AppState, Config, create_app};
use std::io::Cursor;
use tempfile::TempDir;

/// Helper to create a test configuration with a small canvas and both stock overlays
fn create_test_config(temp_dir: &TempDir, width: u32, height: u32) -> Config {
    let mut config = Config::default();

    let templates_dir = temp_dir.path().join("templates");
    std::fs::create_dir_all(&templates_dir).unwrap();

    // Native template size deliberately differs from the canvas
    for (name, color) in [("white", [255, 255, 255]), ("black", [0, 0, 0])] {
        let template = RgbaImage::from_fn(width / 2, height / 2, |x, y| {
            if x % 20 == 0 || y % 20 == 0 {
                Rgba([color[0], color[1], color[2], 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        template
            .save(templates_dir.join(format!("{}_lines.png", name)))
            .unwrap();
    }

    config.canvas.width = width;
    config.canvas.height = height;
    config.overlays.directory = templates_dir;
    config
}

fn create_server(config: Config) -> TestServer {
    let app_state = AppState::new(config).unwrap();
    TestServer::new(create_app(app_state)).unwrap()
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

fn upload_form(bytes: Vec<u8>, overlay: Option<&str>) -> MultipartForm {
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes)
            .file_name("photo.png")
            .mime_type("image/png"),
    );
    match overlay {
        Some(overlay) => form.add_text("overlay", overlay.to_string()),
        None => form,
    }
}

fn decode_response(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));

    let response = server.get("/").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Playmat Builder API is running!");
}

#[tokio::test]
async fn test_upload_returns_png_of_canvas_size() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));

    let response = server
        .post("/upload/")
        .multipart(upload_form(gradient_png(300, 100), Some("black")))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header(header::CONTENT_TYPE), "image/png");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "inline; filename=\"playmat.png\""
    );

    let output = decode_response(response.as_bytes());
    assert_eq!(output.dimensions(), (240, 140));
}

#[tokio::test]
async fn test_upload_accepts_jpeg_and_path_without_slash() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));

    let jpeg = encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(90, 400, Rgb([30, 60, 90]))),
        ImageFormat::Jpeg,
    );
    let response = server
        .post("/upload")
        .multipart(upload_form(jpeg, Some("white")))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(decode_response(response.as_bytes()).dimensions(), (240, 140));
}

#[tokio::test]
async fn test_wide_upload_at_full_canvas_size() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 2400, 1400));

    let response = server
        .post("/upload/")
        .multipart(upload_form(gradient_png(3000, 1000), Some("white")))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        decode_response(response.as_bytes()).dimensions(),
        (2400, 1400)
    );
}

#[tokio::test]
async fn test_missing_overlay_field_defaults_to_white() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 2400, 1400));

    let response = server
        .post("/upload/")
        .multipart(upload_form(gradient_png(1000, 2000), None))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        decode_response(response.as_bytes()).dimensions(),
        (2400, 1400)
    );
}

#[tokio::test]
async fn test_blank_overlay_uses_default_template() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&temp_dir, 240, 140);
    // With the white template gone, falling back to the default must report not found
    std::fs::remove_file(config.overlays.directory.join("white_lines.png")).unwrap();
    let server = create_server(config);

    let response = server
        .post("/upload/")
        .multipart(upload_form(gradient_png(100, 100), Some("  ")))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json();
    assert!(body["detail"].as_str().unwrap().contains("'white'"));
}

#[tokio::test]
async fn test_unknown_overlay_is_404() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));

    let response = server
        .post("/upload/")
        .multipart(upload_form(gradient_png(100, 100), Some("nonexistent")))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("not found"), "detail: {}", detail);
    assert!(!detail.contains("templates"), "path leaked: {}", detail);
}

#[tokio::test]
async fn test_traversal_overlay_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&temp_dir, 240, 140);
    // A template one level above the template directory
    RgbaImage::new(10, 10)
        .save(temp_dir.path().join("escape_lines.png"))
        .unwrap();
    let server = create_server(config);

    for overlay in ["../escape", "a/b", "..\\escape"] {
        let response = server
            .post("/upload/")
            .multipart(upload_form(gradient_png(50, 50), Some(overlay)))
            .await;
        assert_eq!(
            response.status_code(),
            StatusCode::BAD_REQUEST,
            "overlay {:?}",
            overlay
        );
    }
}

#[tokio::test]
async fn test_corrupt_upload_is_500_with_invalid_image_detail() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));

    let response = server
        .post("/upload/")
        .multipart(upload_form(b"this is not an image".to_vec(), Some("white")))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.header(header::CONTENT_TYPE), "application/json");
    let body: serde_json::Value = response.json();
    assert!(body["detail"].as_str().unwrap().starts_with("Invalid image"));
}

#[tokio::test]
async fn test_missing_file_field_is_422() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));

    let response = server
        .post("/upload/")
        .multipart(MultipartForm::new().add_text("overlay", "white"))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&temp_dir, 240, 140);
    config.uploads.max_bytes = 1024;
    let server = create_server(config);

    let response = server
        .post("/upload/")
        .multipart(upload_form(vec![0u8; 64 * 1024], Some("white")))
        .await;

    assert!(
        response.status_code().is_client_error(),
        "status {}",
        response.status_code()
    );
}

#[tokio::test]
async fn test_repeated_uploads_are_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));
    let source = gradient_png(640, 480);

    let first = server
        .post("/upload/")
        .multipart(upload_form(source.clone(), Some("white")))
        .await;
    let second = server
        .post("/upload/")
        .multipart(upload_form(source, Some("white")))
        .await;

    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[tokio::test]
async fn test_output_directory_receives_copy() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&temp_dir, 240, 140);
    let output_dir = temp_dir.path().join("output");
    config.uploads.output_directory = Some(output_dir.clone());
    let server = create_server(config);

    let response = server
        .post("/upload/")
        .multipart(upload_form(gradient_png(120, 120), None))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let saved: Vec<_> = std::fs::read_dir(&output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].extension().unwrap(), "png");
    assert_eq!(std::fs::read(&saved[0]).unwrap(), response.as_bytes().to_vec());
}

#[tokio::test]
async fn test_cors_allows_any_origin_with_credentials() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_server(create_test_config(&temp_dir, 240, 140));

    let response = server
        .get("/")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("https://playmats.example"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        "https://playmats.example"
    );
    assert_eq!(
        response.header(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
        "true"
    );
}
