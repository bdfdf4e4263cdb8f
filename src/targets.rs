//! Target intake: turns one input source into an ordered list of targets.

use crate::{ReconError, Target};
use roxmltree::{Document, Node};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// nmap XML export
    Xml,
    /// Newline separated list of URLs or hosts
    List,
    /// Directory of nmap XML exports
    Dir,
    /// One literal target
    Single,
}

/// Where the targets of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    pub kind: InputKind,
    pub source: String,
}

impl InputSource {
    pub fn new(kind: InputKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }
}

/// Produce the targets for `kind` from `source`, in input order.
///
/// Duplicates are dropped (first occurrence wins) so that no target is
/// captured twice. An empty source yields an empty list.
pub async fn produce_targets(kind: InputKind, source: &str) -> Result<Vec<Target>, ReconError> {
    let raw = match kind {
        InputKind::Xml => targets_from_xml_file(Path::new(source)).await?,
        InputKind::List => {
            let content = read_source(Path::new(source)).await?;
            parse_list(&content)
        }
        InputKind::Dir => targets_from_dir(Path::new(source)).await?,
        InputKind::Single => {
            let target = source.trim();
            if target.is_empty() {
                Vec::new()
            } else {
                vec![target.to_string()]
            }
        }
    };

    let targets = dedup_preserving_order(raw);
    info!("Loaded {} targets ({:?} input)", targets.len(), kind);
    Ok(targets)
}

pub fn parse_list(content: &str) -> Vec<Target> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect()
}

/// Extract web targets from an nmap XML document.
///
/// Only open ports whose service name mentions `http` are kept. The scheme
/// is `https` when nmap saw an SSL tunnel or an `https` service.
pub fn parse_nmap_xml(xml_content: &str) -> Result<Vec<Target>, String> {
    let cleaned = xml_content
        .lines()
        .filter(|line| !line.trim_start().starts_with("<!DOCTYPE"))
        .collect::<Vec<_>>()
        .join("\n");

    let doc = Document::parse(&cleaned).map_err(|e| e.to_string())?;
    let root = doc.root_element();
    if root.tag_name().name() != "nmaprun" {
        return Err(format!(
            "expected <nmaprun> root, found <{}>",
            root.tag_name().name()
        ));
    }

    let mut targets = Vec::new();
    for host in children_named(root, "host") {
        let Some(host_name) = host_identifier(host) else {
            continue;
        };

        for ports in children_named(host, "ports") {
            for port in children_named(ports, "port") {
                if let Some(target) = web_target(&host_name, port) {
                    targets.push(target);
                }
            }
        }
    }

    Ok(targets)
}

fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

/// Hostname when nmap resolved one, otherwise the IP address.
fn host_identifier(host: Node) -> Option<String> {
    let hostname = children_named(host, "hostnames")
        .flat_map(|names| children_named(names, "hostname"))
        .find_map(|name| name.attribute("name"))
        .filter(|name| !name.is_empty());

    if let Some(name) = hostname {
        return Some(name.to_string());
    }

    let addresses: Vec<Node> = children_named(host, "address").collect();
    let address = addresses
        .iter()
        .find(|a| matches!(a.attribute("addrtype"), Some("ipv4") | Some("ipv6")))
        .or_else(|| addresses.first())?;

    let addr = address.attribute("addr")?;
    if address.attribute("addrtype") == Some("ipv6") {
        Some(format!("[{addr}]"))
    } else {
        Some(addr.to_string())
    }
}

fn web_target(host: &str, port: Node) -> Option<Target> {
    let port_id = port
        .attribute("portid")
        .and_then(|p| p.parse::<u16>().ok())
        .filter(|&p| p > 0)?;

    let is_open = children_named(port, "state").any(|state| state.attribute("state") == Some("open"));
    if !is_open {
        return None;
    }

    let service = children_named(port, "service").next()?;
    let service_name = service.attribute("name").unwrap_or("").to_ascii_lowercase();
    if !service_name.contains("http") {
        return None;
    }

    let scheme = if service_name.contains("https") || service.attribute("tunnel") == Some("ssl") {
        "https"
    } else {
        "http"
    };

    Some(format!("{scheme}://{host}:{port_id}"))
}

async fn read_source(path: &Path) -> Result<String, ReconError> {
    fs::read_to_string(path)
        .await
        .map_err(|e| ReconError::TargetSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

async fn targets_from_xml_file(path: &Path) -> Result<Vec<Target>, ReconError> {
    let content = read_source(path).await?;
    parse_nmap_xml(&content).map_err(|reason| ReconError::XmlParse {
        path: path.to_path_buf(),
        reason,
    })
}

async fn targets_from_dir(dir: &Path) -> Result<Vec<Target>, ReconError> {
    let source_error = |e: std::io::Error| ReconError::TargetSource {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut entries = fs::read_dir(dir).await.map_err(source_error)?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(source_error)? {
        let path = entry.path();
        let is_xml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("xml"))
            .unwrap_or(false);
        if is_xml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut targets = Vec::new();
    for file in files {
        debug!("Reading nmap export {}", file.display());
        targets.extend(targets_from_xml_file(&file).await?);
    }
    Ok(targets)
}

fn dedup_preserving_order(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|target| seen.insert(target.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NMAP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap">
  <host>
    <status state="up"/>
    <address addr="10.0.0.5" addrtype="ipv4"/>
    <hostnames/>
    <ports>
      <port protocol="tcp" portid="22"><state state="open"/><service name="ssh"/></port>
      <port protocol="tcp" portid="80"><state state="open"/><service name="http"/></port>
      <port protocol="tcp" portid="443"><state state="open"/><service name="http" tunnel="ssl"/></port>
      <port protocol="tcp" portid="8080"><state state="closed"/><service name="http-proxy"/></port>
    </ports>
  </host>
  <host>
    <address addr="10.0.0.6" addrtype="ipv4"/>
    <hostnames><hostname name="intranet.test" type="PTR"/></hostnames>
    <ports>
      <port protocol="tcp" portid="8443"><state state="open"/><service name="https-alt"/></port>
    </ports>
  </host>
  <host>
    <address addr="fe80::1" addrtype="ipv6"/>
    <ports>
      <port protocol="tcp" portid="8000"><state state="open"/><service name="http-alt"/></port>
    </ports>
  </host>
</nmaprun>"#;

    #[test]
    fn test_parse_nmap_xml() {
        let targets = parse_nmap_xml(NMAP_XML).unwrap();
        assert_eq!(
            targets,
            vec![
                "http://10.0.0.5:80",
                "https://10.0.0.5:443",
                "https://intranet.test:8443",
                "http://[fe80::1]:8000",
            ]
        );
    }

    #[test]
    fn test_parse_nmap_xml_rejects_other_documents() {
        assert!(parse_nmap_xml("<html></html>").is_err());
        assert!(parse_nmap_xml("not xml at all").is_err());
    }

    #[test]
    fn test_parse_nmap_xml_without_hosts() {
        let targets = parse_nmap_xml(r#"<nmaprun scanner="nmap"></nmaprun>"#).unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn test_parse_list() {
        let content = "a.test\n\n  # comment\n https://b.test/login \nc.test\n";
        assert_eq!(parse_list(content), vec!["a.test", "https://b.test/login", "c.test"]);
    }

    #[tokio::test]
    async fn test_single_target() {
        assert_eq!(
            produce_targets(InputKind::Single, " a.test ").await.unwrap(),
            vec!["a.test"]
        );
        assert!(produce_targets(InputKind::Single, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_dedups_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.txt");
        std::fs::write(&path, "b.test\na.test\nb.test\nc.test\n").unwrap();

        let targets = produce_targets(InputKind::List, path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(targets, vec!["b.test", "a.test", "c.test"]);
    }

    #[tokio::test]
    async fn test_empty_list_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let targets = produce_targets(InputKind::List, path.to_str().unwrap())
            .await
            .unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn test_missing_list_is_a_source_error() {
        let err = produce_targets(InputKind::List, "/nonexistent/peepshot/targets.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::TargetSource { .. }));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_dir_reads_xml_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let second = r#"<nmaprun><host><address addr="10.0.0.2" addrtype="ipv4"/><ports>
            <port portid="80"><state state="open"/><service name="http"/></port></ports></host></nmaprun>"#;
        let first = r#"<nmaprun><host><address addr="10.0.0.1" addrtype="ipv4"/><ports>
            <port portid="80"><state state="open"/><service name="http"/></port></ports></host></nmaprun>"#;
        std::fs::write(dir.path().join("b.xml"), second).unwrap();
        std::fs::write(dir.path().join("a.xml"), first).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let targets = produce_targets(InputKind::Dir, dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(targets, vec!["http://10.0.0.1:80", "http://10.0.0.2:80"]);
    }

    #[tokio::test]
    async fn test_malformed_xml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.xml");
        std::fs::write(&path, "<nmaprun><host>").unwrap();

        let err = produce_targets(InputKind::Xml, path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::XmlParse { .. }));
    }
}
