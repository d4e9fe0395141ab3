//! Markup injected into every rewritten page.

/// Attribute carried by the injected banner element.
pub const BANNER_MARKER: &str = "data-offline-snapshot";

/// Visible banner text.
pub const BANNER_TEXT: &str = "Cached Content - Viewing Offline Snapshot";

/// Name of the entry point in the fallback script.
pub const FALLBACK_ENTRY: &str = "initFallbacks";

/// Fixed banner shown at the top of every snapshot page.
#[must_use]
pub fn banner_html() -> String {
    format!(
        r#"<div {BANNER_MARKER}="banner" style="position:fixed;top:0;left:0;right:0;z-index:2147483647;padding:8px 12px;background:#1f6feb;color:#fff;font:14px/1.4 system-ui,sans-serif;text-align:center;">&#128230; {BANNER_TEXT}</div><div {BANNER_MARKER}="spacer" style="height:38px;"></div>"#
    )
}

/// Script restoring basic interactions when the page's own bundle cannot hydrate.
///
/// In-page anchors scroll smoothly to their target, buttons named after a
/// section id scroll to that section, and carousel arrow buttons translate
/// the slide track.
#[must_use]
pub fn fallback_script() -> String {
    format!(
        r##"<script {BANNER_MARKER}="fallback">
(function () {{
  function scrollToId(id) {{
    if (!id) return false;
    var el = document.getElementById(id) || document.querySelector('[id*="' + id + '"]');
    if (!el) return false;
    el.scrollIntoView({{ behavior: 'smooth', block: 'start' }});
    return true;
  }}

  function {FALLBACK_ENTRY}() {{
    document.addEventListener('click', function (e) {{
      var link = e.target.closest('a[href^="#"]');
      if (link && scrollToId(link.getAttribute('href').slice(1))) {{
        e.preventDefault();
        return;
      }}
      var button = e.target.closest('button');
      if (!button || button.closest('[aria-roledescription="carousel"]')) return;
      var name = button.textContent.trim().toLowerCase().replace(/\s+/g, '-');
      if (scrollToId(name)) e.preventDefault();
    }}, true);

    var slideIndex = new WeakMap();
    document.addEventListener('click', function (e) {{
      var button = e.target.closest('button[aria-label*="slide" i]');
      if (!button) return;
      var carousel = button.closest('[aria-roledescription="carousel"]');
      if (!carousel) return;
      var track = carousel.querySelector('[style*="transform"]');
      if (!track || track.children.length === 0) return;
      e.preventDefault();
      e.stopPropagation();
      var count = track.children.length;
      var label = button.getAttribute('aria-label').toLowerCase();
      var current = slideIndex.get(track) || 0;
      if (label.indexOf('next') !== -1) current = (current + 1) % count;
      else if (label.indexOf('prev') !== -1) current = (current - 1 + count) % count;
      slideIndex.set(track, current);
      var width = track.children[0].offsetWidth;
      track.style.transform = 'translate3d(' + (-current * width) + 'px, 0px, 0px)';
    }}, true);
  }}

  if (document.readyState === 'loading') {{
    document.addEventListener('DOMContentLoaded', {FALLBACK_ENTRY});
  }} else {{
    {FALLBACK_ENTRY}();
  }}
}})();
</script>"##
    )
}
