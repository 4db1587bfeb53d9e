//! Tests for the pagesmith server API
//!
//! Test categories:
//! - Size string parsing properties
//! - HTTP endpoints end to end: upload, process, download

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use crate::config::parse_size;

    fn unit() -> impl Strategy<Value = (&'static str, u64)> {
        prop_oneof![
            Just(("B", 1u64)),
            Just(("KB", 1024)),
            Just(("kb", 1024)),
            Just(("MB", 1024 * 1024)),
            Just(("Mb", 1024 * 1024)),
            Just(("GB", 1024 * 1024 * 1024)),
        ]
    }

    proptest! {
        /// Property: "<n><unit>" parses to n times the unit size
        #[test]
        fn size_strings_scale_by_unit(n in 0u64..100_000, (suffix, multiplier) in unit()) {
            let parsed = parse_size(&format!("{}{}", n, suffix));
            prop_assert_eq!(parsed, Some(n * multiplier));
        }

        /// Property: bare numbers are never accepted
        #[test]
        fn bare_numbers_rejected(n in 0u64..1_000_000) {
            prop_assert_eq!(parse_size(&n.to_string()), None);
        }
    }
}

#[cfg(test)]
mod http_endpoint_tests {
    //! HTTP endpoint integration tests using axum-test

    use std::io::{Cursor, Read};
    use std::path::Path;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use pagesmith_core::fixtures::{create_test_pdf, page_markers};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::config::ServerConfig;
    use crate::state::AppState;

    struct Harness {
        server: TestServer,
        dir: TempDir,
    }

    impl Harness {
        fn temp_dir(&self) -> std::path::PathBuf {
            self.dir.path().join("temp")
        }

        /// Names of files currently in the temp directory
        fn stored_files(&self) -> Vec<String> {
            let mut names: Vec<String> = std::fs::read_dir(self.temp_dir())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
    }

    async fn harness_with_limit(limit: &str) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path().join("temp"), limit, Duration::from_secs(3600));
        let state = AppState::new(config).await.unwrap();
        let server = TestServer::new(crate::app(state)).unwrap();
        Harness { server, dir }
    }

    async fn harness() -> Harness {
        harness_with_limit("50MB").await
    }

    fn pdf_part(pages: u32, prefix: &str) -> Part {
        Part::bytes(create_test_pdf(pages, prefix))
            .file_name(format!("{}.pdf", prefix))
            .mime_type("application/pdf")
    }

    fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let h = harness().await;
        let response = h.server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "pagesmith-server");
        assert_eq!(json["tempDirExists"], true);
        assert_eq!(json["maxFileSize"], "50MB");
        assert_eq!(json["features"]["splitIndividual"], true);
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let h = harness().await;
        let response = h.server.get("/health").await;
        assert_eq!(response.header("x-content-type-options"), "nosniff");
        assert_eq!(response.header("x-frame-options"), "DENY");
    }

    #[tokio::test]
    async fn test_merge_and_download() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_part("pdfs", pdf_part(2, "First"))
            .add_part("pdfs", pdf_part(3, "Second"));

        let response = h.server.post("/api/merge-pdf").multipart(form).await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["success"], true);
        assert_eq!(json["mergeResult"]["totalFiles"], 2);
        assert_eq!(json["mergeResult"]["totalPages"], 5);
        assert_eq!(json["fileInfo"][1]["filename"], "Second.pdf");
        assert_eq!(json["fileInfo"][1]["pageCount"], 3);

        let filename = json["filename"].as_str().unwrap().to_string();
        assert!(filename.starts_with("merged-"));
        assert!(json["downloadUrl"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/api/merge-pdf/download/{}", filename)));

        // Inputs are gone, only the result remains
        assert_eq!(h.stored_files(), vec![filename.clone()]);

        let download = h
            .server
            .get(&format!("/api/merge-pdf/download/{}", filename))
            .await;
        download.assert_status_ok();
        assert_eq!(download.header("content-type"), "application/pdf");
        assert_eq!(
            page_markers(download.as_bytes()),
            vec![
                "First-Page-1",
                "First-Page-2",
                "Second-Page-1",
                "Second-Page-2",
                "Second-Page-3"
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_requires_two_files() {
        let h = harness().await;
        let form = MultipartForm::new().add_part("pdfs", pdf_part(2, "Lonely"));

        let response = h.server.post("/api/merge-pdf").multipart(form).await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "TOO_FEW_FILES");
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_merge_reports_every_invalid_file() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_part("pdfs", pdf_part(1, "Good"))
            .add_part(
                "pdfs",
                Part::bytes(b"garbage".to_vec())
                    .file_name("broken.pdf")
                    .mime_type("application/pdf"),
            )
            .add_part(
                "pdfs",
                Part::bytes(b"%PDF-1.4 truncated".to_vec())
                    .file_name("truncated.pdf")
                    .mime_type("application/pdf"),
            );

        let response = h.server.post("/api/merge-pdf").multipart(form).await;
        response.assert_status_bad_request();

        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INVALID_FILES");
        let invalid = json["invalidFiles"].as_array().unwrap();
        assert_eq!(invalid.len(), 2);
        assert_eq!(invalid[0]["filename"], "broken.pdf");
        assert_eq!(invalid[1]["filename"], "truncated.pdf");
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_part("pdfs", pdf_part(1, "Fine"))
            .add_part(
                "pdfs",
                Part::bytes(b"hello".to_vec())
                    .file_name("notes.txt")
                    .mime_type("text/plain"),
            );

        let response = h.server.post("/api/merge-pdf").multipart(form).await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "INVALID_FILE_TYPE");
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_unexpected_field() {
        let h = harness().await;
        let form = MultipartForm::new().add_part("document", pdf_part(2, "Wrong"));

        let response = h.server.post("/api/remove-pages").multipart(form).await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "LIMIT_UNEXPECTED_FILE");
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let h = harness_with_limit("100B").await;
        let form = MultipartForm::new()
            .add_text("pages", "1")
            .add_part("pdf", pdf_part(3, "Big"));

        let response = h.server.post("/api/remove-pages").multipart(form).await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.json::<Value>()["code"], "LIMIT_FILE_SIZE");
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_split_at_pages() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_text("splitType", "split-at-pages")
            .add_text("splitPoints", "2,5")
            .add_part("pdf", pdf_part(7, "Doc"));

        let response = h.server.post("/api/split-pdf").multipart(form).await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["fileInfo"]["originalName"], "Doc.pdf");
        assert_eq!(json["fileInfo"]["originalPages"], 7);
        assert_eq!(json["splitResult"]["operationType"], "split");
        assert_eq!(json["splitResult"]["totalFiles"], 3);
        assert_eq!(json["splitResult"]["files"][1]["pageRange"], "3-5");

        let filename = json["filename"].as_str().unwrap().to_string();
        assert!(filename.starts_with("split-pdf-") && filename.ends_with(".zip"));

        let download = h
            .server
            .get(&format!("/api/split-pdf/download/{}", filename))
            .await;
        download.assert_status_ok();
        assert_eq!(download.header("content-type"), "application/zip");

        let entries = unzip(download.as_bytes());
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "part-1-pages-1-2.pdf",
                "part-2-pages-3-5.pdf",
                "part-3-pages-6-7.pdf"
            ]
        );
        assert_eq!(
            page_markers(&entries[2].1),
            vec!["Doc-Page-6", "Doc-Page-7"]
        );
    }

    #[tokio::test]
    async fn test_split_extract_ranges() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_text("splitType", "extract-ranges")
            .add_text("pageRanges", "1-2, 4")
            .add_part("pdf", pdf_part(5, "Ranges"));

        let response = h.server.post("/api/split-pdf").multipart(form).await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["splitResult"]["operationType"], "extract");
        let files = json["splitResult"]["files"].as_array().unwrap();
        assert_eq!(files[0]["filename"], "pages-1-2.pdf");
        assert_eq!(files[1]["filename"], "pages-4-4.pdf");
        assert_eq!(files[1]["pageRange"], "Page 4");
    }

    #[tokio::test]
    async fn test_split_individual() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_text("splitType", "split-individual")
            .add_part("pdf", pdf_part(3, "Each"));

        let response = h.server.post("/api/split-pdf").multipart(form).await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["splitResult"]["operationType"], "individual");
        assert_eq!(json["splitResult"]["totalFiles"], 3);
        assert_eq!(json["splitResult"]["files"][0]["pageRange"], "Page 1");
        assert_eq!(json["splitResult"]["files"][2]["filename"], "page-3.pdf");
    }

    #[tokio::test]
    async fn test_split_rejects_unknown_type() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_text("splitType", "halve")
            .add_part("pdf", pdf_part(2, "Odd"));

        let response = h.server.post("/api/split-pdf").multipart(form).await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "INVALID_REQUEST");
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_split_at_last_page_is_out_of_bounds() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_text("splitType", "split-at-pages")
            .add_text("splitPoints", "4")
            .add_part("pdf", pdf_part(4, "Edge"));

        let response = h.server.post("/api/split-pdf").multipart(form).await;
        response.assert_status_bad_request();

        let json = response.json::<Value>();
        assert_eq!(json["code"], "OUT_OF_BOUNDS");
        assert_eq!(json["error"], "Invalid page specification");
    }

    #[tokio::test]
    async fn test_remove_pages() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_text("pages", "1,3")
            .add_part("pdf", pdf_part(5, "Trim"));

        let response = h.server.post("/api/remove-pages").multipart(form).await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["removalResult"]["removedPages"], serde_json::json!([1, 3]));
        assert_eq!(json["removalResult"]["removedCount"], 2);
        assert_eq!(json["removalResult"]["remainingCount"], 3);

        let filename = json["filename"].as_str().unwrap().to_string();
        let download = h
            .server
            .get(&format!("/api/remove-pages/download/{}", filename))
            .await;
        download.assert_status_ok();
        assert_eq!(
            page_markers(download.as_bytes()),
            vec!["Trim-Page-2", "Trim-Page-4", "Trim-Page-5"]
        );
    }

    #[tokio::test]
    async fn test_remove_every_page_rejected() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_text("pages", "1-3")
            .add_part("pdf", pdf_part(3, "Gone"));

        let response = h.server.post("/api/remove-pages").multipart(form).await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "ALL_PAGES_REMOVED");
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_remove_pages_requires_pages_field() {
        let h = harness().await;
        let form = MultipartForm::new().add_part("pdf", pdf_part(3, "Blank"));

        let response = h.server.post("/api/remove-pages").multipart(form).await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_pdf_info() {
        let h = harness().await;
        let form = MultipartForm::new().add_part("pdf", pdf_part(6, "Info"));

        let response = h.server.post("/api/pdf-info").multipart(form).await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["filename"], "Info.pdf");
        assert_eq!(json["pageCount"], 6);
        assert!(json["fileSize"].as_u64().unwrap() > 0);
        assert!(h.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_download_rejects_traversal() {
        let h = harness().await;
        let response = h.server.get("/api/merge-pdf/download/..secret.pdf").await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "INVALID_FILENAME");
    }

    #[tokio::test]
    async fn test_download_missing_is_404() {
        let h = harness().await;
        let response = h
            .server
            .get("/api/split-pdf/download/split-pdf-missing.zip")
            .await;
        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["error"], "File not found or expired");
    }

    #[tokio::test]
    async fn test_download_does_not_serve_other_routes_results() {
        let h = harness().await;
        let form = MultipartForm::new()
            .add_part("pdfs", pdf_part(1, "A"))
            .add_part("pdfs", pdf_part(1, "B"));
        let json = h
            .server
            .post("/api/merge-pdf")
            .multipart(form)
            .await
            .json::<Value>();
        let filename = json["filename"].as_str().unwrap();

        assert!(Path::new(&h.temp_dir()).join(filename).exists());
        h.server
            .get(&format!("/api/split-pdf/download/{}", filename))
            .await
            .assert_status_not_found();
    }
}
