// ABOUTME: Outbound URL rewrite table with Host header spoofing for server-to-server LMS calls
// ABOUTME: Maps public LMS origins to internal ones in dev; an empty table is the identity transform
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! URL rewriting for LMS calls made from inside a private network.
//!
//! LMS-issued URLs carry the LMS's public hostname, which may not resolve from
//! where the tool runs. The table is configured as
//! `public1,internal1;public2,internal2`. When a rule applies, the original
//! host is sent back as the `Host` header so the LMS web server does not
//! redirect to its canonical host and drop the `Authorization` header.

use url::Url;

/// One `(public origin, internal origin)` prefix rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    /// Prefix as it appears in LMS-supplied URLs
    pub public_origin: String,
    /// Prefix reachable from this process
    pub internal_origin: String,
}

/// Where an outbound call actually goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTarget {
    /// URL to connect to
    pub url: String,
    /// `Host` header to send, set only when the URL was rewritten
    pub host_header: Option<String>,
}

/// Ordered rewrite table, first matching rule wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlRewriter {
    rules: Vec<RewriteRule>,
}

impl UrlRewriter {
    /// Table with explicit rules
    #[must_use]
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    /// Identity rewriter
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Parse `public,internal;public2,internal2`, skipping malformed entries
    #[must_use]
    pub fn parse(table: &str) -> Self {
        let rules = table
            .split(';')
            .filter_map(|rule| {
                let (public, internal) = rule.split_once(',')?;
                let (public, internal) = (public.trim(), internal.trim());
                (!public.is_empty() && !internal.is_empty()).then(|| RewriteRule {
                    public_origin: public.to_owned(),
                    internal_origin: internal.to_owned(),
                })
            })
            .collect();
        Self { rules }
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rewrite the URL's prefix if it matches a public origin, else return it unchanged
    #[must_use]
    pub fn apply(&self, url: &str) -> String {
        self.rules
            .iter()
            .find_map(|rule| {
                url.strip_prefix(rule.public_origin.as_str())
                    .map(|rest| format!("{}{rest}", rule.internal_origin))
            })
            .unwrap_or_else(|| url.to_owned())
    }

    /// Resolve the connect URL and the `Host` header to spoof for an outbound call
    #[must_use]
    pub fn prepare(&self, url: &str) -> OutboundTarget {
        let rewritten = self.apply(url);
        if rewritten == url {
            return OutboundTarget {
                url: rewritten,
                host_header: None,
            };
        }

        let host_header = original_host(url);
        tracing::debug!(
            original = %url,
            rewritten = %rewritten,
            host = host_header.as_deref().unwrap_or(""),
            "LMS URL rewritten"
        );
        OutboundTarget {
            url: rewritten,
            host_header,
        }
    }
}

/// `host[:port]` of the URL as the LMS knows itself
fn original_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(parsed.port().map_or_else(|| host.to_owned(), |port| format!("{host}:{port}")))
}
