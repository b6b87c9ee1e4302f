use quick_xml::events::Event;
use quick_xml::Reader;

use crate::models::Dependency;

const MAVEN_META: &str = "META-INF/maven/";

pub fn is_pom_properties(entry: &str) -> bool {
    entry.starts_with(MAVEN_META) && entry.ends_with("/pom.properties")
}

pub fn is_pom_xml(entry: &str) -> bool {
    entry.starts_with(MAVEN_META) && entry.ends_with("/pom.xml")
}

/// Read coordinates from a `pom.properties` file written by the Maven archiver.
pub fn from_pom_properties(content: &str) -> Option<Dependency> {
    let mut group = None;
    let mut artifact = None;
    let mut version = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "groupId" => group = Some(value),
            "artifactId" => artifact = Some(value),
            "version" => version = Some(value),
            _ => {}
        }
    }

    Some(Dependency {
        group: group?,
        artifact: artifact?,
        version: version?,
        library_id: None,
    })
}

/// Read the project coordinates of an embedded `pom.xml`, inheriting group and
/// version from `<parent>` when the project omits them.
pub fn from_pom_xml(content: &str) -> Option<Dependency> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();

    let mut group = None;
    let mut artifact = None;
    let mut version = None;
    let mut parent_group = None;
    let mut parent_version = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name =
                    String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                let path: Vec<&str> = stack.iter().map(String::as_str).collect();
                match path.as_slice() {
                    ["project", "groupId"] => group = Some(text),
                    ["project", "artifactId"] => artifact = Some(text),
                    ["project", "version"] => version = Some(text),
                    ["project", "parent", "groupId"] => parent_group = Some(text),
                    ["project", "parent", "version"] => parent_version = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    Some(Dependency {
        group: group.or(parent_group)?,
        artifact: artifact?,
        version: version.or(parent_version)?,
        library_id: None,
    })
}
