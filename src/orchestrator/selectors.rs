//! Page structure the orchestrator relies on. Kept in one place so layout
//! changes on the target site are a one-file fix.

use crate::surface::Locator;

pub const CLICKABLE: &str = "button, div[role='button'], span[role='button']";

// Session
pub const LOGIN_FORM: &str = "form#loginForm, form[method='post']";
pub const USERNAME_INPUT: &str = "input[name='username']";
pub const PASSWORD_INPUT: &str = "input[name='password']";
pub const SUBMIT_BUTTON: &str = "button[type='submit']";
pub const HOME_ICON: &str = "svg[aria-label='Home']";

/// Cookie banners, notification prompts and "save your login info".
/// Text locators match case-insensitively, so each entry must differ by more
/// than case.
pub const POPUP_DISMISS_TEXTS: [&str; 3] = ["Allow all cookies", "Decline optional cookies", "Not Now"];

// Notifications
pub const NOTIFICATION_ITEM: &str = "main div[role='listitem'], main div[role='button'], main li";
pub const LINK: &str = "a[href]";

// Post view
pub const DIALOG: &str = "div[role='dialog']";
pub const ARTICLE: &str = "article";
pub const OWNER_LINK: &str = "header a[href]";
pub const CAPTION: &str = "h1";
pub const IMAGE: &str = "img[src]";
pub const VIDEO: &str = "video";
pub const COMMENT_ITEM: &str = "ul li";
pub const COMMENT_INPUT: &str = "textarea, div[contenteditable='true'][role='textbox']";
pub const VIEW_ALL_TEXT: &str = "View all";
pub const REPLY_TEXT: &str = "Reply";
pub const POST_TEXT: &str = "Post";

// Profile view
pub const POST_LINK: &str = "a[href*='/p/'], a[href*='/reel/']";
pub const PINNED_MARKER: &str = "svg[aria-label*='Pinned']";
pub const PRIVATE_MARKER_CSS: &str = "h2, span";
pub const PRIVATE_MARKER_TEXT: &str = "This account is private";

/// Media hosts whose `video/*` responses carry the real stream URL.
pub const MEDIA_HOSTS: [&str; 2] = ["cdninstagram", "fbcdn"];

pub fn authenticated(handle: &str) -> Locator {
    Locator::css(format!("a[href='/{}/'], {}", handle, HOME_ICON))
}

pub fn clickable_with_text(text: &str) -> Locator {
    Locator::text(CLICKABLE, text)
}
