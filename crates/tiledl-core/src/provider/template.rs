//! Tile URL templates: `{z}`, `{x}`, `{y}`, `{s}` and static `{param}` placeholders.

use std::collections::BTreeMap;

use crate::coverage::TileCoordinate;

/// One parsed piece of a template.
#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Z,
    X,
    Y,
    Subdomain,
}

/// A validated URL template with static parameters already substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplate {
    parts: Vec<Part>,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    /// Parse `template`, substituting `params` and checking that `{z}`, `{x}`
    /// and `{y}` all appear. Unknown placeholders are rejected.
    pub fn parse(
        template: &str,
        params: &BTreeMap<String, String>,
        subdomains: &[String],
    ) -> Result<Self, String> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| format!("unclosed placeholder in {template:?}"))?;
            let name = &after[..close];
            let part = match name {
                "z" => Some(Part::Z),
                "x" => Some(Part::X),
                "y" => Some(Part::Y),
                "s" => Some(Part::Subdomain),
                other => match params.get(other) {
                    Some(value) => {
                        literal.push_str(value);
                        None
                    }
                    None => return Err(format!("unknown placeholder {{{other}}}")),
                },
            };
            if let Some(part) = part {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(part);
            }
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        for (needed, label) in [(Part::Z, "{z}"), (Part::X, "{x}"), (Part::Y, "{y}")] {
            if !parts.contains(&needed) {
                return Err(format!("template is missing {label}"));
            }
        }
        let subdomains = if subdomains.is_empty() {
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        } else {
            subdomains.to_vec()
        };
        let t = Self { parts, subdomains };
        let origin = TileCoordinate::new(0, 0, 0).ok_or("zoom 0 origin rejected")?;
        let sample = t.render(&origin);
        let parsed = url::Url::parse(&sample).map_err(|e| format!("not a valid URL ({sample}): {e}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(format!("unsupported scheme {:?}", parsed.scheme()));
        }
        Ok(t)
    }

    /// Render the URL for one tile. The subdomain is `(x + y) mod n` so a
    /// given tile always hits the same host.
    pub fn render(&self, coord: &TileCoordinate) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Z => out.push_str(&coord.zoom().to_string()),
                Part::X => out.push_str(&coord.x().to_string()),
                Part::Y => out.push_str(&coord.y().to_string()),
                Part::Subdomain => {
                    let i = (coord.x() as u64 + coord.y() as u64) % self.subdomains.len() as u64;
                    out.push_str(&self.subdomains[i as usize]);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn renders_xyz() {
        let t = UrlTemplate::parse("https://tile.example.org/{z}/{x}/{y}.png", &no_params(), &[]).unwrap();
        let c = TileCoordinate::new(5, 16, 10).unwrap();
        assert_eq!(t.render(&c), "https://tile.example.org/5/16/10.png");
    }

    #[test]
    fn subdomain_is_deterministic() {
        let t = UrlTemplate::parse("https://{s}.tile.example.org/{z}/{x}/{y}.png", &no_params(), &[]).unwrap();
        let c = TileCoordinate::new(3, 1, 1).unwrap();
        assert_eq!(t.render(&c), "https://c.tile.example.org/3/1/1.png");
        assert_eq!(t.render(&c), t.render(&c));
        let c0 = TileCoordinate::new(3, 0, 0).unwrap();
        assert!(t.render(&c0).starts_with("https://a."));
    }

    #[test]
    fn static_params_substituted() {
        let mut params = BTreeMap::new();
        params.insert("apikey".to_string(), "secret".to_string());
        let t = UrlTemplate::parse(
            "https://api.example.com/{z}/{x}/{y}.png?key={apikey}",
            &params,
            &[],
        )
        .unwrap();
        let c = TileCoordinate::new(1, 1, 0).unwrap();
        assert_eq!(t.render(&c), "https://api.example.com/1/1/0.png?key=secret");
    }

    #[test]
    fn missing_or_unknown_placeholders_rejected() {
        assert!(UrlTemplate::parse("https://x.org/{z}/{x}.png", &no_params(), &[]).is_err());
        assert!(UrlTemplate::parse("https://x.org/{z}/{x}/{y}?k={apikey}", &no_params(), &[]).is_err());
        assert!(UrlTemplate::parse("https://x.org/{z}/{x}/{y", &no_params(), &[]).is_err());
    }

    #[test]
    fn non_http_scheme_rejected() {
        assert!(UrlTemplate::parse("file:///tiles/{z}/{x}/{y}.png", &no_params(), &[]).is_err());
    }
}
