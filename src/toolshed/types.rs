/// Installed tool definitions

use serde::{Deserialize, Serialize};

/// A tool installed from a tool shed repository
///
/// `repo_path` is the local checkout holding the tool's files, including the
/// images its help text links to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledTool {
    /// Tool shed host, e.g. "toolshed.g2.bx.psu.edu"
    pub tool_shed: String,
    pub owner: String,
    pub repository: String,
    pub tool_id: String,
    pub version: String,
    pub repo_path: String,
}

impl InstalledTool {
    /// Globally unique id: `{shed}/repos/{owner}/{repo}/{tool}/{version}`
    pub fn guid(&self) -> String {
        tool_guid(
            &self.tool_shed,
            &self.owner,
            &self.repository,
            &self.tool_id,
            &self.version,
        )
    }
}

pub fn tool_guid(shed: &str, owner: &str, repository: &str, tool_id: &str, version: &str) -> String {
    [shed, "repos", owner, repository, tool_id, version].join("/")
}
