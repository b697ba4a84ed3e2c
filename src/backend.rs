use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    config::SessionConfig,
    error::{Result, WorkspaceError},
    types::FileTree,
};

/// Backend of record for project trees
///
/// Writes replace the whole tree; there is no partial update.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Replace the stored tree of `project_id`
    async fn update_file_tree(&self, project_id: &str, tree: &FileTree) -> Result<()>;

    /// Fetch a project, including its current tree
    ///
    /// Returns `WorkspaceError::NotFound` if the project doesn't exist
    async fn fetch_project(&self, project_id: &str) -> Result<ProjectRecord>;

    /// Get a human-readable identifier for this backend (for logging/debugging)
    fn identifier(&self) -> String;
}

/// A project as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(alias = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_tree: FileTree,
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Deserialize)]
struct ProjectResponse {
    project: ProjectRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateFileTree<'a> {
    project_id: &'a str,
    file_tree: &'a FileTree,
}

/// HTTP backend speaking the project REST API
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url` (e.g. `https://api.example.com`)
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("collab-workspace/0.3")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            auth_token,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.api_url.clone(), config.auth_token.clone())
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn update_file_tree(&self, project_id: &str, tree: &FileTree) -> Result<()> {
        let body = UpdateFileTree {
            project_id,
            file_tree: tree,
        };
        let request = self
            .client
            .put(self.url("/project/update-file-tree"))
            .json(&body);

        let response = self.authorize(request).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(WorkspaceError::NotFound {
                path: project_id.to_string(),
            }),
            status => {
                let message = format!(
                    "Unexpected status {}: {}",
                    status,
                    response.text().await.unwrap_or_default()
                );
                Err(WorkspaceError::Persistence { message })
            }
        }
    }

    async fn fetch_project(&self, project_id: &str) -> Result<ProjectRecord> {
        let request = self
            .client
            .get(self.url(&format!("/project/get-project/{}", project_id)));

        let response = self.authorize(request).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body: ProjectResponse = response.json().await?;
                Ok(body.project)
            }
            StatusCode::NOT_FOUND => Err(WorkspaceError::NotFound {
                path: project_id.to_string(),
            }),
            status => {
                let message = format!(
                    "Unexpected status {}: {}",
                    status,
                    response.text().await.unwrap_or_default()
                );
                Err(WorkspaceError::Persistence { message })
            }
        }
    }

    fn identifier(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileNode;
    use mockito::Matcher;

    fn tree() -> FileTree {
        FileTree::new().with_entry("index.js", FileNode::file("run()", Some("javascript")))
    }

    #[test]
    fn test_url_joining() {
        let backend = HttpBackend::new("http://localhost:3000/", None);
        assert_eq!(
            backend.url("/project/update-file-tree"),
            "http://localhost:3000/project/update-file-tree"
        );
        assert_eq!(backend.url("project/x"), "http://localhost:3000/project/x");
    }

    #[tokio::test]
    async fn test_update_file_tree_sends_whole_tree() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/project/update-file-tree")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(serde_json::json!({
                "projectId": "p1",
                "fileTree": {
                    "index.js": { "file": { "contents": "run()", "language": "javascript" } }
                }
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url(), Some("secret".to_string()));
        backend.update_file_tree("p1", &tree()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_failure_is_persistence_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/project/update-file-tree")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url(), None);
        let result = backend.update_file_tree("p1", &tree()).await;

        match result {
            Err(WorkspaceError::Persistence { message }) => assert!(message.contains("boom")),
            other => panic!("Expected Persistence error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_project() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/project/get-project/p1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "project": {
                        "_id": "p1",
                        "name": "demo",
                        "users": [{ "id": "u1", "email": "a@example.com" }],
                        "fileTree": { "src": { "directory": {} } },
                        "version": 3
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url(), None);
        let project = backend.fetch_project("p1").await.unwrap();

        assert_eq!(project.id, "p1");
        assert_eq!(project.name, "demo");
        assert_eq!(project.version, Some(3));
        assert_eq!(project.file_tree.get("src"), Some(&FileNode::empty_directory()));
    }

    #[tokio::test]
    async fn test_fetch_missing_project() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/project/get-project/nope")
            .with_status(404)
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url(), None);
        assert!(matches!(
            backend.fetch_project("nope").await,
            Err(WorkspaceError::NotFound { .. })
        ));
    }
}
