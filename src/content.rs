use async_trait::async_trait;
use std::{io, path::PathBuf, sync::Arc};
use thiserror::Error;

use crate::route_table::PageId;

/// Shown while a session resolves or while an allowed page's content loads.
const PLACEHOLDER_HTML: &str = r#"<!doctype html>
<html lang="fr">
<head><meta charset="utf-8"><title>SmartMadrassa</title></head>
<body>
<div class="page-loader" role="status" aria-busy="true"></div>
</body>
</html>
"#;

pub fn placeholder_html() -> &'static str {
    PLACEHOLDER_HTML
}

/// PageContent
///
/// A loaded content module, ready to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub page: PageId,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content for page '{page}' could not be read: {source}")]
    Io {
        page: &'static str,
        #[source]
        source: io::Error,
    },
}

/// ContentLoader
///
/// Loads the content module of a page on demand. The shell only calls this
/// after the guard has allowed the navigation.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self, page: PageId) -> Result<PageContent, ContentError>;
}

/// The concrete type used to share the content loader across the application state.
pub type ContentState = Arc<dyn ContentLoader>;

/// StaticContentLoader
///
/// Serves `<dir>/<slug>.html` when a content directory is configured and the
/// file exists; otherwise an application shell that boots the frontend bundle
/// on the requested page.
#[derive(Debug, Clone, Default)]
pub struct StaticContentLoader {
    dir: Option<PathBuf>,
}

impl StaticContentLoader {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ContentLoader for StaticContentLoader {
    async fn load(&self, page: PageId) -> Result<PageContent, ContentError> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.html", page.slug()));
            match tokio::fs::read_to_string(&path).await {
                Ok(html) => return Ok(PageContent { page, html }),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "no content file; serving application shell");
                }
                Err(source) => {
                    return Err(ContentError::Io {
                        page: page.slug(),
                        source,
                    });
                }
            }
        }

        Ok(PageContent {
            page,
            html: application_shell(page),
        })
    }
}

fn application_shell(page: PageId) -> String {
    format!(
        r#"<!doctype html>
<html lang="fr">
<head><meta charset="utf-8"><title>SmartMadrassa</title></head>
<body>
<div id="app" data-page="{slug}"></div>
<script type="module" src="/assets/app.js"></script>
</body>
</html>
"#,
        slug = page.slug()
    )
}
