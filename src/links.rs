//! Deep links
//!
//! Parses `fomio://` route strings and universal links of the forum site
//! (`https://<site>/t/<slug>/<id>`) into a [`Route`].

use thiserror::Error;

/// Custom URL scheme
pub const SCHEME: &str = "fomio://";

/// A screen the client can open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Home feed
    Home,
    /// A Byte (topic), optionally scrolled to a post
    Byte {
        /// Topic id
        id: u64,
        /// Post number to scroll to
        post_number: Option<u64>,
    },
    /// A Teret (subcategory) feed
    Teret {
        /// Category id
        id: u64,
    },
    /// A Hub (parent category)
    Hub {
        /// Category id
        id: u64,
    },
    /// A user profile
    Profile {
        /// Username
        username: String,
    },
    /// The composer, optionally resuming a draft slot
    Compose {
        /// Draft key to resume
        draft_key: Option<String>,
    },
    /// Sign-in screen
    Auth,
    /// Settings screen
    Settings,
}

/// Why a link could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Neither `fomio://` nor `http(s)://`
    #[error("Unsupported link: {0}")]
    UnsupportedScheme(String),
    /// A web link to some other site
    #[error("Link points to another site: {0}")]
    ForeignHost(String),
    /// A path no screen handles
    #[error("Unknown route: {0}")]
    UnknownRoute(String),
    /// A numeric segment that is not a number
    #[error("Invalid id in link: {0}")]
    InvalidId(String),
}

impl Route {
    /// Parse a `fomio://` route or a web link on `site`
    pub fn parse(link: &str, site: &str) -> Result<Self, LinkError> {
        let link = link.trim();
        if let Some(rest) = link.strip_prefix(SCHEME) {
            return Self::parse_app(rest);
        }

        let web = link
            .strip_prefix("https://")
            .or_else(|| link.strip_prefix("http://"))
            .ok_or_else(|| LinkError::UnsupportedScheme(link.to_string()))?;
        let host = site_host(site);
        let (link_host, path) = web.split_once('/').unwrap_or((web, ""));
        if !link_host.eq_ignore_ascii_case(host) {
            return Err(LinkError::ForeignHost(link_host.to_string()));
        }
        Self::parse_web(path)
    }

    fn parse_app(rest: &str) -> Result<Self, LinkError> {
        let (path, query) = split_query(rest);
        let segments = segments(path);

        match segments.as_slice() {
            [] | ["home"] => Ok(Self::Home),
            ["byte", id] => Ok(Self::Byte {
                id: parse_id(id)?,
                post_number: None,
            }),
            ["byte", id, post] => Ok(Self::Byte {
                id: parse_id(id)?,
                post_number: Some(parse_id(post)?),
            }),
            ["teret", id] => Ok(Self::Teret { id: parse_id(id)? }),
            ["hub", id] => Ok(Self::Hub { id: parse_id(id)? }),
            ["profile", username] => Ok(Self::Profile {
                username: decode(username),
            }),
            ["compose"] => Ok(Self::Compose {
                draft_key: query_param(query, "draft"),
            }),
            ["auth", ..] => Ok(Self::Auth),
            ["settings"] => Ok(Self::Settings),
            _ => Err(LinkError::UnknownRoute(rest.to_string())),
        }
    }

    fn parse_web(path: &str) -> Result<Self, LinkError> {
        let (path, _) = split_query(path);
        let segments = segments(path);

        match segments.as_slice() {
            [] | ["latest"] => Ok(Self::Home),
            // Slugless post link: /t/<id>/<post>
            ["t", id, post] if is_number(id) && is_number(post) => Ok(Self::Byte {
                id: parse_id(id)?,
                post_number: Some(parse_id(post)?),
            }),
            ["t", _, id] | ["t", id] => Ok(Self::Byte {
                id: parse_id(id)?,
                post_number: None,
            }),
            ["t", _slug, id, post] => Ok(Self::Byte {
                id: parse_id(id)?,
                post_number: Some(parse_id(post)?),
            }),
            ["c", .., id] if is_number(id) => Ok(Self::Teret { id: parse_id(id)? }),
            ["u", username, ..] => Ok(Self::Profile {
                username: decode(username),
            }),
            _ => Err(LinkError::UnknownRoute(format!("/{path}"))),
        }
    }

    /// The `fomio://` form of this route
    pub fn to_link(&self) -> String {
        match self {
            Self::Home => format!("{SCHEME}home"),
            Self::Byte {
                id,
                post_number: None,
            } => format!("{SCHEME}byte/{id}"),
            Self::Byte {
                id,
                post_number: Some(post),
            } => format!("{SCHEME}byte/{id}/{post}"),
            Self::Teret { id } => format!("{SCHEME}teret/{id}"),
            Self::Hub { id } => format!("{SCHEME}hub/{id}"),
            Self::Profile { username } => {
                format!("{SCHEME}profile/{}", urlencoding::encode(username))
            }
            Self::Compose { draft_key: None } => format!("{SCHEME}compose"),
            Self::Compose {
                draft_key: Some(key),
            } => format!("{SCHEME}compose?draft={}", urlencoding::encode(key)),
            Self::Auth => format!("{SCHEME}auth"),
            Self::Settings => format!("{SCHEME}settings"),
        }
    }
}

fn site_host(site: &str) -> &str {
    let host = site
        .strip_prefix("https://")
        .or_else(|| site.strip_prefix("http://"))
        .unwrap_or(site);
    host.split('/').next().unwrap_or(host)
}

fn split_query(s: &str) -> (&str, Option<&str>) {
    let s = s.split('#').next().unwrap_or(s);
    match s.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (s, None),
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn is_number(segment: &str) -> bool {
    segment.parse::<u64>().is_ok()
}

fn parse_id(segment: &str) -> Result<u64, LinkError> {
    segment
        .parse()
        .map_err(|_| LinkError::InvalidId(segment.to_string()))
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| decode(value))
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = "https://meta.fomio.app";

    #[test]
    fn test_app_routes() {
        assert_eq!(Route::parse("fomio://", SITE).unwrap(), Route::Home);
        assert_eq!(
            Route::parse("fomio://byte/42", SITE).unwrap(),
            Route::Byte {
                id: 42,
                post_number: None
            }
        );
        assert_eq!(
            Route::parse("fomio://profile/j%C3%B6rg", SITE).unwrap(),
            Route::Profile {
                username: "jörg".to_string()
            }
        );
        assert_eq!(
            Route::parse("fomio://compose?draft=new_topic", SITE).unwrap(),
            Route::Compose {
                draft_key: Some("new_topic".to_string())
            }
        );
        assert_eq!(Route::parse("fomio://auth/callback?payload=x", SITE).unwrap(), Route::Auth);
    }

    #[test]
    fn test_universal_links() {
        assert_eq!(
            Route::parse("https://meta.fomio.app/t/welcome-to-fomio/17", SITE).unwrap(),
            Route::Byte {
                id: 17,
                post_number: None
            }
        );
        assert_eq!(
            Route::parse("https://META.fomio.app/t/welcome/17/4?u=bob", SITE).unwrap(),
            Route::Byte {
                id: 17,
                post_number: Some(4)
            }
        );
        assert_eq!(
            Route::parse("https://meta.fomio.app/t/123/4", SITE).unwrap(),
            Route::Byte {
                id: 123,
                post_number: Some(4)
            }
        );
        assert_eq!(
            Route::parse("https://meta.fomio.app/t/123", SITE).unwrap(),
            Route::Byte {
                id: 123,
                post_number: None
            }
        );
        assert_eq!(
            Route::parse("https://meta.fomio.app/c/tech/rust/9", SITE).unwrap(),
            Route::Teret { id: 9 }
        );
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            Route::parse("fomio://nowhere", SITE),
            Err(LinkError::UnknownRoute(_))
        ));
        assert!(matches!(
            Route::parse("fomio://byte/abc", SITE),
            Err(LinkError::InvalidId(_))
        ));
        assert!(matches!(
            Route::parse("https://example.com/t/x/1", SITE),
            Err(LinkError::ForeignHost(_))
        ));
        assert!(matches!(
            Route::parse("ftp://meta.fomio.app", SITE),
            Err(LinkError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_to_link_parses_back() {
        let route = Route::Compose {
            draft_key: Some("topic 12".to_string()),
        };
        assert_eq!(route.to_link(), "fomio://compose?draft=topic%2012");
        assert_eq!(Route::parse(&route.to_link(), SITE).unwrap(), route);
    }
}
