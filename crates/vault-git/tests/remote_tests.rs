//! Remote URL acceptance tests

use proptest::prelude::*;
use rstest::rstest;
use vault_git::{Error, RemoteUrl};

#[rstest]
#[case("git@github.com:ops/host-configs.git")]
#[case("deploy-bot@git.internal.example:infra/etc/db01.git")]
#[case("a.b_c@host:x.git")]
#[case("git@10.0.0.4:~user/configs.git")]
fn accepts_ssh_remotes(#[case] url: &str) {
    let parsed = RemoteUrl::parse(url).unwrap();
    assert_eq!(parsed.as_str(), url);
}

#[rstest]
#[case("https://github.com/ops/host-configs.git")]
#[case("ssh://git@github.com/ops/host-configs.git")]
#[case("git@github.com:ops/host-configs")]
#[case("github.com:ops/host-configs.git")]
#[case("git@github.com:ops/host configs.git")]
#[case("git@github.com:ops/$(reboot).git")]
#[case("")]
fn rejects_other_forms(#[case] url: &str) {
    assert!(matches!(
        RemoteUrl::parse(url),
        Err(Error::InvalidRemote { .. })
    ));
}

#[test]
fn deserializes_through_validation() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        #[allow(dead_code)]
        url: RemoteUrl,
    }

    let ok: Result<Wrapper, _> = serde_json::from_str(r#"{"url":"git@h:r.git"}"#);
    assert!(ok.is_ok());

    let bad: Result<Wrapper, _> = serde_json::from_str(r#"{"url":"http://h/r.git"}"#);
    assert!(bad.is_err());
}

proptest! {
    #[test]
    fn well_formed_remotes_always_parse(
        user in "[A-Za-z0-9._-]{1,12}",
        host in "[A-Za-z0-9.-]{1,20}",
        path in "[A-Za-z0-9._~/-]{1,30}",
    ) {
        let url = format!("{user}@{host}:{path}.git");
        prop_assert!(RemoteUrl::parse(&url).is_ok());
    }

    #[test]
    fn shell_metacharacters_are_rejected(
        prefix in "[a-z]{1,8}",
        bad in "[;&|`$ <>'\"]",
    ) {
        let url = format!("git@host:{prefix}{bad}x.git");
        prop_assert!(RemoteUrl::parse(&url).is_err());
    }
}
