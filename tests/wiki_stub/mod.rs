use std::collections::VecDeque;
use std::io::Read as _;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const DAY_PAGE: &str = "Modèle:Entrée étrangère du jour/2021/03/05";
pub const DAY_EXTRACT: &str = "<p><b>Apfel</b> — allemand \\ˈap͡fəl\\ masculin</p>\n<ol>\n<li>Pomme.\n<ul><li><i>Ein Apfel am Tag.</i></li></ul>\n</li>\n<li>Pommier.</li>\n</ol>";
pub const LONG_DAY_EXTRACT: &str = "<p><b>Apfel</b> — allemand \\ˈap͡fəl\\ masculin</p>\n<ol>\n<li>Pomme, fruit du pommier, de forme ronde, à la peau rouge, verte ou jaune selon la variété cultivée.</li>\n<li>Pommier, arbre fruitier de la famille des rosacées, cultivé dans les vergers de toute l'Europe.</li>\n<li>Pomme d'Adam, saillie du cartilage thyroïde à l'avant du cou, plus marquée chez l'homme adulte.</li>\n<li>Pomme de terre, dans certains parlers régionaux, tubercule comestible de la morelle tubéreuse.</li>\n</ol>";
pub const POMME: &str = "== Français ==\n\n=== Étymologie ===\nDu latin pomum.\n\n=== Nom commun ===\npomme \\pɔm\\ féminin\nFruit du pommier.";
pub const HUND: &str = "== Allemand ==\n=== Étymologie ===\nx\n=== Nom commun ===\nHund\nChien.";

static CARD_PNG: &[u8] = &[137, 80, 78, 71, 13, 10, 26, 10];

#[derive(Debug, Clone)]
pub struct StubConfig {
    /// Article pages carry `og:title`.
    pub og_title: bool,
    pub random_titles: Vec<&'static str>,
    /// Extract served for the entry-of-the-day page.
    pub day_extract: &'static str,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            og_title: true,
            random_titles: Vec::new(),
            day_extract: DAY_EXTRACT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Wiki API, article pages, thumbnail and Bluesky XRPC on one local port.
pub struct WikiStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl WikiStub {
    pub fn spawn(config: StubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start wiki stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let image_url = format!("{base_url}/img/card.png");
        let mut random: VecDeque<&'static str> = config.random_titles.iter().copied().collect();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let url = url::Url::parse(&format!("http://stub{}", request.url()))
                    .expect("parse request url");
                let path = percent_decode(url.path());
                recorded.lock().expect("lock requests").push(Recorded {
                    method: request.method().to_string(),
                    path: path.clone(),
                    body,
                });

                let response = if path == "/w/api.php" {
                    let param = |name: &str| {
                        url.query_pairs()
                            .find(|(k, _)| k == name)
                            .map(|(_, v)| v.into_owned())
                    };
                    if param("list").as_deref() == Some("random") {
                        let title = random.pop_front().unwrap_or("pomme");
                        json(serde_json::json!({
                            "query": { "random": [{ "id": 1, "ns": 0, "title": title }] }
                        }))
                    } else {
                        let title = param("titles").unwrap_or_default();
                        let extract = match title.as_str() {
                            DAY_PAGE => Some(config.day_extract),
                            "pomme" => Some(POMME),
                            "Hund" => Some(HUND),
                            _ => None,
                        };
                        json(match extract {
                            Some(extract) => serde_json::json!({
                                "query": { "pages": { "42": { "pageid": 42, "title": title, "extract": extract } } }
                            }),
                            None => serde_json::json!({
                                "query": { "pages": { "-1": { "ns": 10, "title": title, "missing": "" } } }
                            }),
                        })
                    }
                } else if let Some(word) = path.strip_prefix("/wiki/") {
                    let title_tag = if config.og_title {
                        format!(r#"<meta property="og:title" content="{word} — Wiktionnaire">"#)
                    } else {
                        String::new()
                    };
                    let html = format!(
                        r#"<!doctype html><html><head>{title_tag}<meta property="og:image" content="{image_url}"></head><body>{word}</body></html>"#
                    );
                    tiny_http::Response::from_data(html.into_bytes()).with_header(
                        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..])
                            .expect("build header"),
                    )
                } else if path == "/img/card.png" {
                    tiny_http::Response::from_data(CARD_PNG.to_vec()).with_header(
                        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"image/png"[..])
                            .expect("build header"),
                    )
                } else if path == "/xrpc/com.atproto.server.createSession" {
                    json(serde_json::json!({
                        "accessJwt": "jwt-stub",
                        "refreshJwt": "refresh-stub",
                        "handle": "bot.test",
                        "did": "did:plc:stub"
                    }))
                } else if path == "/xrpc/com.atproto.repo.uploadBlob" {
                    json(serde_json::json!({
                        "blob": {
                            "$type": "blob",
                            "ref": { "$link": "bafkstub" },
                            "mimeType": "image/png",
                            "size": CARD_PNG.len()
                        }
                    }))
                } else if path == "/xrpc/com.atproto.repo.createRecord" {
                    json(serde_json::json!({
                        "uri": "at://did:plc:stub/app.bsky.feed.post/1",
                        "cid": "bafyrecord"
                    }))
                } else {
                    tiny_http::Response::from_data(b"not found".to_vec()).with_status_code(404)
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock requests").clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for WikiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json(value: serde_json::Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    tiny_http::Response::from_data(value.to_string().into_bytes()).with_header(
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            .expect("build header"),
    )
}

fn percent_decode(path: &str) -> String {
    url::form_urlencoded::parse(format!("p={}", path.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
