//! Shared fixtures for integration tests: INLabs mock endpoints, bundle
//! archives and XML envelopes.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use dou_extractor::config::Config;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockBuilder, MockServer, Request, ResponseTemplate};
use zip::write::SimpleFileOptions;

pub const SESSION_TOKEN: &str = "token-123";

/// Set to `1` to make a missing loopback socket fail the mock-portal tests.
pub const STRICT_SOCKETS_VAR: &str = "DOU_EXTRACTOR_REQUIRE_SOCKET_TESTS";

/// Starts a mock INLabs portal, or `None` when loopback sockets are
/// unavailable (sandboxed runners) and `STRICT_SOCKETS_VAR` is unset.
pub async fn mock_portal() -> Option<MockServer> {
    if let Err(error) = TcpListener::bind("127.0.0.1:0") {
        let strict = std::env::var(STRICT_SOCKETS_VAR).is_ok_and(|v| v == "1" || v == "true");
        assert!(!strict, "no loopback socket for the mock portal: {error}");
        eprintln!("skipping mock portal test, no loopback socket: {error}");
        return None;
    }
    Some(MockServer::start().await)
}

/// An envelope with the given identity, section and HTML body.
pub fn envelope(id: &str, pub_name: &str, texto: &str) -> String {
    format!(
        r#"<xml><article id="{id}" idOficio="100{id}" idMateria="200{id}" pubName="{pub_name}"
 artType="Portaria" artCategory="Ministério da Economia" editionNumber="1" numberPage="3"
 pubDate="02/01/2024" pdfPage="http://pesquisa.in.gov.br/imprensa/jsp/visualiza/index.jsp?data=02/01/2024&amp;jornal=515&amp;pagina=3">
<body><Identifica><![CDATA[PORTARIA Nº {id}]]></Identifica><Ementa/><Texto><![CDATA[{texto}]]></Texto></body>
</article></xml>"#
    )
}

/// Builds a stored (uncompressed) ZIP in memory.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Config JSON pointing at the mock server, with work dirs under `root`.
pub fn config_json(server_uri: &str, root: &Path, sections: &[&str]) -> String {
    serde_json::json!({
        "URL_LOGIN": format!("{server_uri}/logar.php"),
        "URL_DOWNLOAD": format!("{server_uri}/index.php?p="),
        "SECOES": sections,
        "DOWNLOAD_FOLDER": root.join("download"),
        "UNZIP_FOLDER": root.join("unzip"),
        "READ_TIMEOUT_SECS": 1,
    })
    .to_string()
}

pub fn config(server_uri: &str, root: &Path, sections: &[&str]) -> Config {
    Config::from_json_str(&config_json(server_uri, root, sections)).expect("valid config")
}

pub fn write_config(server_uri: &str, root: &Path, sections: &[&str]) -> PathBuf {
    let path = root.join("config.json");
    std::fs::write(&path, config_json(server_uri, root, sections)).expect("write config");
    path
}

/// Login endpoint that issues the session cookie.
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/logar.php"))
        .respond_with(ResponseTemplate::new(200).insert_header(
            "set-cookie",
            format!("inlabs_session_cookie={SESSION_TOKEN}; Path=/").as_str(),
        ))
        .mount(server)
        .await;
}

/// Request matcher for one `{date}-{section}.zip` bundle.
pub fn bundle_request(dl: &str) -> MockBuilder {
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("dl", dl))
}

/// Matches requests whose `Cookie` header carries the session token.
pub struct SessionCookie;

impl Match for SessionCookie {
    fn matches(&self, request: &Request) -> bool {
        let expected = format!("inlabs_session_cookie={SESSION_TOKEN}");
        request
            .headers
            .get_all("cookie")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.split(';').any(|pair| pair.trim() == expected))
    }
}

/// Whether a directory exists and is empty.
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}
