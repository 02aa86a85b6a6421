//! Periodic git synchronization of the ACL data directory.
//!
//! When a remote repository is configured, a dedicated task clones it on
//! first sight and fast-forwards the configured branch on every tick. Git
//! operations are blocking, so each tick runs under `spawn_blocking`; a
//! hanging remote occupies a blocking thread, never the request path. A
//! failed tick is logged and the next tick starts fresh.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, FetchOptions, RemoteCallbacks, Repository};

use tollgate_core::config::GitSyncConfig;
use tollgate_types::prelude::*;

/// Spawn the sync loop. Does nothing unless `repo_url` is configured.
pub fn start(config: GitSyncConfig) {
	if config.repo_url.is_none() {
		return;
	}

	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(config.sync_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			ticker.tick().await;
			let tick_config = config.clone();
			match tokio::task::spawn_blocking(move || sync_repo(&tick_config)).await {
				Ok(Ok(())) => info!("ACL repository synced successfully"),
				Ok(Err(err)) => warn!("Error syncing ACL repository: {}", err),
				Err(err) => warn!("ACL sync task failed: {}", err),
			}
		}
	});
}

/// One synchronization tick: clone if the local path does not exist yet,
/// fast-forward pull otherwise. "Already up to date" is success.
pub fn sync_repo(config: &GitSyncConfig) -> TgResult<()> {
	let Some(repo_url) = config.repo_url.as_deref() else {
		return Ok(());
	};

	if config.repo_path.exists() {
		pull(config)
	} else {
		clone(config, repo_url)
	}
}

fn fetch_options(config: &GitSyncConfig) -> FetchOptions<'_> {
	let mut callbacks = RemoteCallbacks::new();
	let username = config.username.clone();
	let password = config.password.clone();
	callbacks.credentials(move |_url, _username_from_url, _allowed| {
		if username.is_empty() {
			Cred::default()
		} else {
			Cred::userpass_plaintext(&username, &password)
		}
	});
	let mut options = FetchOptions::new();
	options.remote_callbacks(callbacks);
	options
}

fn git_err(context: &str, err: &git2::Error) -> Error {
	Error::NetworkError(format!("{}: {}", context, err.message()))
}

/// Single-branch clone of the configured branch.
fn clone(config: &GitSyncConfig, repo_url: &str) -> TgResult<()> {
	let branch = config.branch_name.clone();
	let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);

	RepoBuilder::new()
		.branch(&config.branch_name)
		.fetch_options(fetch_options(config))
		.remote_create(move |repo, name, url| repo.remote_with_fetch(name, url, &refspec))
		.clone(repo_url, &config.repo_path)
		.map_err(|err| git_err("failed to clone repository", &err))?;

	info!("Cloned ACL repository into {}", config.repo_path.display());
	Ok(())
}

/// Fetch the configured branch and fast-forward the local ref to it.
fn pull(config: &GitSyncConfig) -> TgResult<()> {
	let repo = Repository::open(&config.repo_path)
		.map_err(|err| git_err("failed to open repository", &err))?;

	let mut remote = repo
		.find_remote("origin")
		.map_err(|err| git_err("failed to find origin remote", &err))?;
	remote
		.fetch(&[config.branch_name.as_ref()], Some(&mut fetch_options(config)), None)
		.map_err(|err| git_err("failed to fetch", &err))?;

	let fetch_head = repo
		.find_reference("FETCH_HEAD")
		.map_err(|err| git_err("failed to read FETCH_HEAD", &err))?;
	let fetch_commit = repo
		.reference_to_annotated_commit(&fetch_head)
		.map_err(|err| git_err("failed to resolve fetched commit", &err))?;

	let (analysis, _) = repo
		.merge_analysis(&[&fetch_commit])
		.map_err(|err| git_err("failed to analyze merge", &err))?;

	if analysis.is_up_to_date() {
		return Ok(());
	}
	if !analysis.is_fast_forward() {
		return Err(Error::NetworkError(
			"remote branch diverged, refusing non-fast-forward pull".into(),
		));
	}

	let refname = format!("refs/heads/{}", config.branch_name);
	let mut reference = repo
		.find_reference(&refname)
		.map_err(|err| git_err("failed to find local branch", &err))?;
	reference
		.set_target(fetch_commit.id(), "fast-forward")
		.map_err(|err| git_err("failed to fast-forward", &err))?;
	repo.set_head(&refname).map_err(|err| git_err("failed to set HEAD", &err))?;
	repo.checkout_head(Some(CheckoutBuilder::default().force()))
		.map_err(|err| git_err("failed to checkout", &err))?;

	Ok(())
}


// vim: ts=4
