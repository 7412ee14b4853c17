//! Publishing a vendored module to its git repository.
//!
//! The release flow clones the target repository into a temporary directory,
//! swaps the destination subtree for the vendored output, commits, pushes, and
//! optionally tags the commit and pushes the tag.
//!
//! ## Repository layout
//!
//! Module `github.com/acme/client/v2` is published to
//! `https://github.com/acme/client.git` under `v2/`; a module without a major
//! version suffix is published at the repository root.

use crate::error::{GovenError, Result};
use crate::materialize::{self, Exclusions};
use colored::*;
use git2::build::RepoBuilder;
use git2::{
    Commit, Cred, ErrorCode, FetchOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature,
};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static MAJOR_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v[0-9]+$").expect("major version regex"));

/// Commit author and push credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Commit author name (a display name, not an account)
    pub name: String,
    pub email: String,
    /// Account used for push
    pub user: String,
    pub token: String,
}

/// Where a release goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub repository: String,
    /// Destination inside the repository, `.` for the root
    pub path: String,
}

impl ReleaseTarget {
    /// Derive the target from a module path.
    pub fn for_module(module: &str) -> Self {
        let (repo, major) = split_major_version(module);
        Self {
            repository: format!("https://{}.git", repo),
            path: major.unwrap_or(".").to_string(),
        }
    }
}

/// Split a trailing `/vN` segment off a module path.
pub fn split_major_version(module: &str) -> (&str, Option<&str>) {
    match module.rsplit_once('/') {
        Some((repo, last)) if MAJOR_VERSION.is_match(last) => (repo, Some(last)),
        _ => (module, None),
    }
}

/// Release tags have the form `vMAJOR.MINOR.PATCH`.
pub fn validate_tag(tag: &str) -> Result<semver::Version> {
    let invalid = || {
        GovenError::InvalidArgument(format!(
            "version \"{}\" has to be in format \"vMAJOR.MINOR.PATCH\"",
            tag
        ))
    };
    let bare = tag.strip_prefix('v').ok_or_else(invalid)?;
    semver::Version::parse(bare).map_err(|_| invalid())
}

pub struct Publisher {
    target: ReleaseTarget,
    tag: Option<String>,
    credentials: Credentials,
}

impl Publisher {
    pub fn new(target: ReleaseTarget, tag: Option<String>, credentials: Credentials) -> Self {
        Self {
            target,
            tag,
            credentials,
        }
    }

    pub fn commit_message(&self) -> String {
        match &self.tag {
            Some(tag) => format!("Release {}", tag),
            None => "Release changes".to_string(),
        }
    }

    /// Publish the contents of `source`. Returns the pushed commit.
    pub fn publish(&self, source: &Path) -> Result<Oid> {
        if let Some(tag) = &self.tag {
            validate_tag(tag)?;
        }
        let workdir = tempfile::tempdir().map_err(GovenError::publish("clone"))?;
        let url = &self.target.repository;

        let spinner = spinner(format!("Cloning {}...", url));
        let cloned = RepoBuilder::new()
            .fetch_options(self.fetch_options())
            .clone(url, workdir.path());
        spinner.finish_and_clear();
        let repo = cloned.map_err(GovenError::publish("clone"))?;
        println!("   {} Cloned {}", "+".green(), url);

        clear_destination(workdir.path(), &self.target.path)
            .map_err(GovenError::publish("remove"))?;

        let destination = if self.target.path == "." {
            workdir.path().to_path_buf()
        } else {
            workdir.path().join(&self.target.path)
        };
        let exclusions = Exclusions::new(&[] as &[&str], &[".git"])?;
        materialize::copy_tree(source, &destination, &exclusions)
            .map_err(GovenError::publish("copy"))?;

        let tree_id = stage_all(&repo).map_err(GovenError::publish("stage"))?;

        let message = self.commit_message();
        let signature = Signature::now(&self.credentials.name, &self.credentials.email)
            .map_err(GovenError::publish("commit"))?;
        let commit_id = commit(&repo, tree_id, &signature, &message)
            .map_err(GovenError::publish("commit"))?;
        println!("   {} Committed {}: {}", "~".cyan(), short_id(commit_id), message);

        let branch = repo
            .head()
            .ok()
            .and_then(|head| head.name().map(str::to_string))
            .ok_or_else(|| GovenError::Publish {
                step: "push",
                message: "HEAD does not point at a branch".to_string(),
            })?;
        self.push(&repo, &format!("{0}:{0}", branch))
            .map_err(GovenError::publish("push"))?;
        println!("   {} Pushed {}", "↑".green(), branch);

        if let Some(tag) = &self.tag {
            let target = repo
                .find_object(commit_id, None)
                .map_err(GovenError::publish("tag"))?;
            repo.tag(tag, &target, &signature, &message, false)
                .map_err(GovenError::publish("tag"))?;
            self.push(&repo, &format!("refs/tags/{0}:refs/tags/{0}", tag))
                .map_err(GovenError::publish("push tag"))?;
            println!("   {} Tagged {}", "📌".blue(), tag);
        }

        println!("{} Released to {}", "✓".green(), url);
        Ok(commit_id)
    }

    fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|_url, _username, _allowed| {
            Cred::userpass_plaintext(&self.credentials.user, &self.credentials.token)
        });
        callbacks
    }

    fn fetch_options(&self) -> FetchOptions<'_> {
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.callbacks());
        options
    }

    fn push(&self, repo: &Repository, refspec: &str) -> std::result::Result<(), git2::Error> {
        let mut callbacks = self.callbacks();
        callbacks.push_update_reference(|refname, status| match status {
            Some(reason) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, reason
            ))),
            None => Ok(()),
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let spinner = spinner(format!("Pushing {}...", refspec));
        let result = repo
            .find_remote("origin")
            .and_then(|mut remote| remote.push(&[refspec], Some(&mut options)));
        spinner.finish_and_clear();
        result
    }
}

/// Remove the previous contents of `path` inside the clone; `.` clears
/// everything except `.git`.
fn clear_destination(root: &Path, path: &str) -> Result<()> {
    if path != "." {
        return materialize::remove_tree(&root.join(path));
    }
    for entry in fs::read_dir(root).map_err(|e| GovenError::io("list directory", root, e))? {
        let entry = entry.map_err(|e| GovenError::io("list directory", root, e))?;
        if entry.file_name() == ".git" {
            continue;
        }
        materialize::remove_tree(&entry.path())?;
    }
    Ok(())
}

/// Stage additions, modifications and deletions; returns the new tree.
fn stage_all(repo: &Repository) -> std::result::Result<Oid, git2::Error> {
    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write()?;
    index.write_tree()
}

fn commit(
    repo: &Repository,
    tree_id: Oid,
    signature: &Signature<'_>,
    message: &str,
) -> std::result::Result<Oid, git2::Error> {
    let tree = repo.find_tree(tree_id)?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        // freshly created repository without commits
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(e),
    };
    let parents: Vec<&Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), signature, signature, message, &tree, &parents)
}

fn short_id(oid: Oid) -> String {
    oid.to_string().chars().take(7).collect()
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
