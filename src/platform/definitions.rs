//! Static platform definition table.
//!
//! Each entry lists the domains a platform serves from, the URL and path
//! patterns that identify a post, how to pull the post id out of a URL, and the
//! per-platform canonicalisation rules (host rewrites, tracking parameters,
//! query ordering).

use std::sync::LazyLock;

use regex::Regex;

use super::types::Platform;

/// Query parameters stripped from every URL regardless of platform.
///
/// Entries ending in `*` match by prefix.
pub(crate) const GLOBAL_TRACKING_PARAMS: &[&str] = &[
    "utm_*",
    "fbclid",
    "gclid",
    "dclid",
    "gbraid",
    "wbraid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "yclid",
    "twclid",
    "ttclid",
    "li_fat_id",
    "igshid",
    "_ga",
    "_gl",
    "ref",
    "ref_src",
    "ref_url",
    "referrer",
    "share_id",
    "si",
    "mibextid",
];

/// Hosts whose links only resolve by following redirects.
///
/// Canonicalisation leaves these untouched; see `ShortUrlExpander`.
pub(crate) const SHORTENER_DOMAINS: &[&str] = &[
    "t.co",
    "bit.ly",
    "buff.ly",
    "ow.ly",
    "tinyurl.com",
    "goo.gl",
    "shorturl.at",
    "dlvr.it",
    "trib.al",
    "lnkd.in",
    "fb.me",
    "fb.watch",
    "vm.tiktok.com",
    "vt.tiktok.com",
    "pin.it",
    "redd.it",
];

pub(crate) struct PlatformDefinition {
    pub platform: Platform,
    /// Registrable domains; subdomains of these match as well.
    pub domains: &'static [&'static str],
    /// Patterns matched against the full URL.
    pub url_patterns: Vec<Regex>,
    /// Patterns matched against `path[?query]`.
    pub path_patterns: Vec<Regex>,
    /// Patterns with an `id` capture group, matched against `path[?query]`.
    pub post_id_patterns: Vec<Regex>,
    /// Host every alias collapses to. `None` keeps the (www-stripped) host.
    pub canonical_host: Option<&'static str>,
    /// Mobile subdomains and legacy domains rewritten to `canonical_host`.
    pub host_rewrites: &'static [&'static str],
    pub tracking_params: &'static [&'static str],
    pub sort_query: bool,
}

impl PlatformDefinition {
    pub fn matches_host(&self, host: &str) -> bool {
        self.domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid platform pattern {p}: {e}")))
        .collect()
}

pub(crate) static PLATFORM_DEFINITIONS: LazyLock<Vec<PlatformDefinition>> = LazyLock::new(|| {
    vec![
        PlatformDefinition {
            platform: Platform::X,
            domains: &["x.com", "twitter.com"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?(?:x|twitter)\.com/[A-Za-z0-9_]{1,15}/status(?:es)?/\d+",
            ]),
            path_patterns: compile(&[
                r"^/[A-Za-z0-9_]{1,15}/status(?:es)?/\d+",
                r"^/i/web/status/\d+",
            ]),
            post_id_patterns: compile(&[r"/status(?:es)?/(?P<id>\d+)"]),
            canonical_host: Some("x.com"),
            host_rewrites: &[
                "twitter.com",
                "mobile.twitter.com",
                "m.twitter.com",
                "mobile.x.com",
                "m.x.com",
            ],
            tracking_params: &["s", "t", "cxt"],
            sort_query: false,
        },
        PlatformDefinition {
            platform: Platform::Facebook,
            domains: &["facebook.com", "fb.com", "fb.watch", "fb.me"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?facebook\.com/(?:[A-Za-z0-9.]+/(?:posts|videos|photos)/|permalink\.php\?|story\.php\?|photo(?:\.php)?/?\?|watch/?\?v=|reel/\d+|groups/[^/]+/(?:posts|permalink)/|share/[pvr]/)",
            ]),
            path_patterns: compile(&[
                r"^/[A-Za-z0-9.]+/(?:posts|videos|photos)/",
                r"^/(?:permalink|story)\.php",
                r"^/photo(?:\.php)?",
                r"^/watch",
                r"^/reel/\d+",
                r"^/groups/[^/]+/(?:posts|permalink)/",
                r"^/share/[pvr]/",
            ]),
            post_id_patterns: compile(&[
                r"[?&]story_fbid=(?P<id>[A-Za-z0-9]+)",
                r"/posts/(?P<id>[A-Za-z0-9]+)",
                r"/permalink/(?P<id>\d+)",
                r"/videos/(?:[^/]+/)?(?P<id>\d+)",
                r"/reel/(?P<id>\d+)",
                r"[?&]fbid=(?P<id>\d+)",
                r"[?&]v=(?P<id>\d+)",
                r"/share/[pvr]/(?P<id>[A-Za-z0-9]+)",
            ]),
            canonical_host: Some("facebook.com"),
            host_rewrites: &[
                "m.facebook.com",
                "mbasic.facebook.com",
                "web.facebook.com",
                "touch.facebook.com",
                "fb.com",
            ],
            tracking_params: &[
                "__cft__*",
                "__tn__",
                "rdid",
                "sfnsn",
                "notif_id",
                "notif_t",
                "comment_tracking",
                "paipv",
                "eav",
                "hc_ref",
                "fref",
                "extid",
            ],
            sort_query: true,
        },
        PlatformDefinition {
            platform: Platform::Instagram,
            domains: &["instagram.com", "instagr.am"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?instagram\.com/(?:[A-Za-z0-9_.]+/)?(?:p|reel|reels|tv)/[A-Za-z0-9_-]+",
            ]),
            path_patterns: compile(&[r"^/(?:[A-Za-z0-9_.]+/)?(?:p|reel|reels|tv)/[A-Za-z0-9_-]+"]),
            post_id_patterns: compile(&[r"/(?:p|reel|reels|tv)/(?P<id>[A-Za-z0-9_-]+)"]),
            canonical_host: Some("instagram.com"),
            host_rewrites: &["instagr.am", "m.instagram.com"],
            tracking_params: &["igsh", "img_index", "hl"],
            sort_query: false,
        },
        PlatformDefinition {
            platform: Platform::Threads,
            domains: &["threads.net", "threads.com"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?threads\.(?:net|com)/@[A-Za-z0-9_.]+/post/[A-Za-z0-9_-]+",
            ]),
            path_patterns: compile(&[r"^/@[A-Za-z0-9_.]+/post/[A-Za-z0-9_-]+", r"^/t/[A-Za-z0-9_-]+"]),
            post_id_patterns: compile(&[
                r"/post/(?P<id>[A-Za-z0-9_-]+)",
                r"^/t/(?P<id>[A-Za-z0-9_-]+)",
            ]),
            canonical_host: Some("threads.net"),
            host_rewrites: &["threads.com"],
            tracking_params: &["xmt", "slof"],
            sort_query: false,
        },
        PlatformDefinition {
            platform: Platform::LinkedIn,
            domains: &["linkedin.com", "lnkd.in"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?linkedin\.com/(?:posts/[^/?#]+|feed/update/urn:li:(?:activity|share|ugcPost):\d+|pulse/[^/?#]+)",
            ]),
            path_patterns: compile(&[
                r"^/posts/[^/?#]+",
                r"^/feed/update/urn:li:(?:activity|share|ugcPost):\d+",
                r"^/pulse/",
            ]),
            post_id_patterns: compile(&[
                r"urn:li:(?:activity|share|ugcPost):(?P<id>\d+)",
                r"-(?:activity|share|ugcPost)-(?P<id>\d+)",
            ]),
            canonical_host: Some("linkedin.com"),
            host_rewrites: &["m.linkedin.com"],
            tracking_params: &[
                "trk",
                "trackingId",
                "lipi",
                "midToken",
                "midSig",
                "trkEmail",
                "eid",
                "rcm",
                "originalSubdomain",
            ],
            sort_query: true,
        },
        PlatformDefinition {
            platform: Platform::TikTok,
            domains: &["tiktok.com"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?tiktok\.com/@[A-Za-z0-9_.]+/(?:video|photo)/\d+",
            ]),
            path_patterns: compile(&[r"^/@[A-Za-z0-9_.]+/(?:video|photo)/\d+", r"^/v/\d+"]),
            post_id_patterns: compile(&[r"/(?:video|photo|v)/(?P<id>\d+)"]),
            canonical_host: Some("tiktok.com"),
            host_rewrites: &["m.tiktok.com"],
            tracking_params: &[
                "is_from_webapp",
                "sender_device",
                "sender_web_id",
                "is_copy_url",
                "web_id",
                "_r",
                "_t",
                "_d",
                "checksum",
                "sec_uid",
                "share_app_id",
                "share_link_id",
                "tt_from",
                "u_code",
                "user_id",
                "lang",
            ],
            sort_query: false,
        },
        PlatformDefinition {
            platform: Platform::YouTube,
            domains: &["youtube.com", "youtu.be"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?youtube\.com/(?:watch\?(?:[^#]*&)?v=[A-Za-z0-9_-]{11}|shorts/[A-Za-z0-9_-]{11}|live/[A-Za-z0-9_-]{11})",
                r"^https?://youtu\.be/[A-Za-z0-9_-]{11}",
            ]),
            path_patterns: compile(&[
                r"^/watch\?(?:[^#]*&)?v=[A-Za-z0-9_-]{11}",
                r"^/(?:shorts|live|embed)/[A-Za-z0-9_-]{11}",
            ]),
            post_id_patterns: compile(&[
                r"[?&]v=(?P<id>[A-Za-z0-9_-]{11})",
                r"^/(?:shorts|live|embed)/(?P<id>[A-Za-z0-9_-]{11})",
                r"^/(?P<id>[A-Za-z0-9_-]{11})(?:\?|$)",
            ]),
            canonical_host: Some("youtube.com"),
            host_rewrites: &["m.youtube.com", "music.youtube.com"],
            tracking_params: &["feature", "pp", "t", "ab_channel", "app"],
            sort_query: true,
        },
        PlatformDefinition {
            platform: Platform::Reddit,
            domains: &["reddit.com", "redd.it"],
            url_patterns: compile(&[
                r"^https?://(?:www\.)?reddit\.com/r/[A-Za-z0-9_]+/(?:comments|s)/[A-Za-z0-9]+",
            ]),
            path_patterns: compile(&[
                r"^/r/[A-Za-z0-9_]+/(?:comments|s)/[A-Za-z0-9]+",
                r"^/comments/[A-Za-z0-9]+",
                r"^/u(?:ser)?/[A-Za-z0-9_-]+/comments/[A-Za-z0-9]+",
            ]),
            post_id_patterns: compile(&[
                r"/comments/(?P<id>[A-Za-z0-9]+)",
                r"/s/(?P<id>[A-Za-z0-9]+)",
            ]),
            canonical_host: Some("reddit.com"),
            host_rewrites: &[
                "old.reddit.com",
                "new.reddit.com",
                "m.reddit.com",
                "np.reddit.com",
                "i.reddit.com",
            ],
            tracking_params: &[
                "context",
                "rdt",
                "ref_campaign",
                "ref_source",
                "$deep_link",
                "correlation_id",
                "post_fullname",
                "post_index",
                "_branch_match_id",
                "_branch_referrer",
            ],
            sort_query: true,
        },
        PlatformDefinition {
            platform: Platform::Pinterest,
            domains: &[
                "pinterest.com",
                "pin.it",
                "pinterest.co.uk",
                "pinterest.ca",
                "pinterest.de",
                "pinterest.fr",
                "pinterest.com.au",
            ],
            url_patterns: compile(&[r"^https?://(?:www\.)?pinterest\.com/pin/[A-Za-z0-9_-]+"]),
            path_patterns: compile(&[r"^/pin/[A-Za-z0-9_-]+"]),
            post_id_patterns: compile(&[r"/pin/(?P<id>[A-Za-z0-9_-]+)"]),
            canonical_host: Some("pinterest.com"),
            host_rewrites: &[
                "pinterest.co.uk",
                "pinterest.ca",
                "pinterest.de",
                "pinterest.fr",
                "pinterest.com.au",
                "uk.pinterest.com",
                "ca.pinterest.com",
                "de.pinterest.com",
                "fr.pinterest.com",
                "au.pinterest.com",
            ],
            tracking_params: &["mt", "invite_code", "sender", "sfo", "sender_id"],
            sort_query: false,
        },
        PlatformDefinition {
            platform: Platform::Bluesky,
            domains: &["bsky.app"],
            url_patterns: compile(&[r"^https?://bsky\.app/profile/[^/]+/post/[a-z0-9]+"]),
            path_patterns: compile(&[r"^/profile/[^/]+/post/[a-z0-9]+"]),
            post_id_patterns: compile(&[r"/post/(?P<id>[a-z0-9]+)"]),
            canonical_host: Some("bsky.app"),
            host_rewrites: &[],
            tracking_params: &[],
            sort_query: false,
        },
        PlatformDefinition {
            platform: Platform::Mastodon,
            domains: &[
                "mastodon.social",
                "mastodon.online",
                "mstdn.social",
                "fosstodon.org",
                "hachyderm.io",
                "infosec.exchange",
            ],
            url_patterns: compile(&[
                r"^https?://(?:mastodon\.social|mastodon\.online|mstdn\.social|fosstodon\.org|hachyderm\.io|infosec\.exchange)/@[A-Za-z0-9_]+/\d+",
            ]),
            path_patterns: compile(&[
                r"^/@[A-Za-z0-9_.]+(?:@[A-Za-z0-9.-]+)?/\d+",
                r"^/users/[A-Za-z0-9_]+/statuses/\d+",
            ]),
            post_id_patterns: compile(&[r"/statuses/(?P<id>\d+)", r"^/@[^/]+/(?P<id>\d+)"]),
            canonical_host: None,
            host_rewrites: &[],
            tracking_params: &[],
            sort_query: false,
        },
        PlatformDefinition {
            platform: Platform::Substack,
            domains: &["substack.com"],
            url_patterns: compile(&[r"^https?://[a-z0-9-]+\.substack\.com/p/[a-z0-9-]+"]),
            path_patterns: compile(&[r"^/p/[A-Za-z0-9-]+", r"^/@[A-Za-z0-9_]+/note/c-\d+"]),
            post_id_patterns: compile(&[r"/p/(?P<id>[A-Za-z0-9-]+)", r"/note/(?P<id>c-\d+)"]),
            canonical_host: None,
            host_rewrites: &[],
            tracking_params: &["r", "s", "triedRedirect", "showWelcome"],
            sort_query: true,
        },
        PlatformDefinition {
            platform: Platform::Tumblr,
            domains: &["tumblr.com"],
            url_patterns: compile(&[
                r"^https?://(?:[a-z0-9-]+\.tumblr\.com/post/\d+|(?:www\.)?tumblr\.com/[a-z0-9-]+/\d+)",
            ]),
            path_patterns: compile(&[r"^/post/\d+", r"^/[a-z0-9-]+/\d+"]),
            post_id_patterns: compile(&[r"/post/(?P<id>\d+)", r"^/[a-z0-9-]+/(?P<id>\d+)"]),
            canonical_host: None,
            host_rewrites: &[],
            tracking_params: &["source"],
            sort_query: false,
        },
    ]
});

/// Looks up the definition for a platform.
pub(crate) fn definition_for(platform: Platform) -> Option<&'static PlatformDefinition> {
    PLATFORM_DEFINITIONS.iter().find(|d| d.platform == platform)
}

/// Finds the first platform whose domain list covers `host`.
pub(crate) fn definition_for_host(host: &str) -> Option<&'static PlatformDefinition> {
    PLATFORM_DEFINITIONS.iter().find(|d| d.matches_host(host))
}

/// Whether `name` appears in `params`, honouring `prefix*` entries.
pub(crate) fn param_listed(params: &[&str], name: &str) -> bool {
    params.iter().any(|p| match p.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => *p == name,
    })
}
