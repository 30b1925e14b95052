use url::Url;

/// Query parameters that carry sign-in credentials.
const CREDENTIAL_PARAMS: &[&str] = &[
    "access_token",
    "refresh_token",
    "expires_in",
    "expires_at",
    "token_type",
    "type",
    "code",
    "email",
];

/// Removes magic-link credentials from a post-sign-in URL: the whole fragment when it
/// carries an `access_token`, and any credential query parameters.
pub fn strip_magic_link(url: &Url) -> Url {
    let mut clean = url.clone();

    if clean
        .fragment()
        .is_some_and(|fragment| fragment.contains("access_token"))
    {
        clean.set_fragment(None);
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !CREDENTIAL_PARAMS.iter().any(|param| *param == &**name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(kept);
    }

    clean
}

/// Resolves the `redirect_to` a magic link carried against the public base URL.
/// Foreign origins are not followed; the base URL is used instead.
pub fn resolve_redirect(public_url: &str, redirect_to: Option<&str>) -> Option<Url> {
    let base = Url::parse(public_url).ok()?;
    let target = redirect_to
        .and_then(|r| base.join(r).ok())
        .filter(|r| r.origin() == base.origin())
        .unwrap_or_else(|| base.clone());
    Some(strip_magic_link(&target))
}
