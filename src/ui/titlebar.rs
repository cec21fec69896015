use super::{
    ActiveTheme, AnyElement, AppView, Context, Hsla, InteractiveElement, IntoElement,
    ParentElement, SharedString, Styled, WINDOW_TITLE, Window, WindowControlArea, div, h_flex,
    px,
};

#[cfg(not(target_os = "macos"))]
struct ControlButton {
    id: &'static str,
    area: WindowControlArea,
    glyph: &'static str,
    destructive: bool,
}

#[cfg(target_os = "windows")]
const CONTROL_FONT: &str = "Segoe Fluent Icons";

impl AppView {
    pub(super) fn render_titlebar(
        &self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let state = self.session.state();

        let (highlighted, status_text) = status(
            state.running,
            state.camera_granted,
            self.session.stream_size(),
        );
        let status_color = if highlighted {
            theme.success
        } else {
            theme.muted_foreground
        };

        h_flex()
            .window_control_area(WindowControlArea::Drag)
            .h(px(super::TITLEBAR_HEIGHT))
            .w_full()
            .items_center()
            .justify_between()
            .bg(gpui::rgb(0x0b0f1a))
            .child(
                h_flex()
                    .gap_3()
                    .pl(px(80.0))
                    .pr_3()
                    .h_full()
                    .items_center()
                    .child(
                        div()
                            .text_sm()
                            .text_color(gpui::rgb(0xe0e0e0))
                            .child(WINDOW_TITLE),
                    )
                    .child(pill(status_color, status_text)),
            )
            .child(render_controls(window))
            .into_any_element()
    }
}

/// Whether the pill is highlighted, and its text.
fn status(
    running: bool,
    camera_granted: bool,
    stream: Option<(u32, u32)>,
) -> (bool, SharedString) {
    match (running, stream) {
        (true, Some((width, height))) => (true, format!("● Tracking {width}x{height}").into()),
        (true, None) => (true, "● Tracking".into()),
        _ if camera_granted => (false, "○ Waiting for video".into()),
        _ => (false, "○ Camera off".into()),
    }
}

fn pill(color: Hsla, text: SharedString) -> impl IntoElement {
    div()
        .px_2()
        .py_0p5()
        .rounded_md()
        .bg(gpui::rgba(0x00000033))
        .text_xs()
        .text_color(color)
        .child(text)
}

#[cfg(target_os = "macos")]
fn render_controls(_window: &mut Window) -> AnyElement {
    // Native traffic lights are drawn by the system.
    div().into_any_element()
}

#[cfg(not(target_os = "macos"))]
fn render_controls(window: &mut Window) -> AnyElement {
    let buttons = control_buttons(window.is_maximized());
    let mut row = h_flex().id("window-controls").h_full().items_center();

    for button in buttons {
        let hover = if button.destructive {
            gpui::rgb(0xe81123)
        } else {
            gpui::rgb(0x2a3140)
        };
        let cell = div()
            .id(button.id)
            .flex()
            .items_center()
            .justify_center()
            .occlude()
            .h_full()
            .w(px(46.0))
            .cursor_pointer()
            .text_color(gpui::rgb(0xc9d1d9))
            .hover(move |s| s.bg(hover))
            .window_control_area(button.area);

        #[cfg(target_os = "windows")]
        let cell = cell
            .font_family(CONTROL_FONT)
            .text_size(px(10.0))
            .child(button.glyph);

        #[cfg(not(target_os = "windows"))]
        let cell = cell.child(
            gpui::svg()
                .size(px(16.0))
                .path(button.glyph)
                .text_color(gpui::rgb(0xc9d1d9)),
        );

        row = row.child(cell);
    }

    row.into_any_element()
}

#[cfg(target_os = "windows")]
fn control_buttons(maximized: bool) -> [ControlButton; 3] {
    [
        ControlButton {
            id: "minimize",
            area: WindowControlArea::Min,
            glyph: "\u{e921}",
            destructive: false,
        },
        ControlButton {
            id: "maximize-or-restore",
            area: WindowControlArea::Max,
            glyph: if maximized { "\u{e923}" } else { "\u{e922}" },
            destructive: false,
        },
        ControlButton {
            id: "close",
            area: WindowControlArea::Close,
            glyph: "\u{e8bb}",
            destructive: true,
        },
    ]
}

// SVG path data for the glyphs on Linux and other platforms.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn control_buttons(_maximized: bool) -> [ControlButton; 3] {
    [
        ControlButton {
            id: "minimize",
            area: WindowControlArea::Min,
            glyph: "M 4,8 H 12",
            destructive: false,
        },
        ControlButton {
            id: "maximize",
            area: WindowControlArea::Max,
            glyph: "M 4,4 H 12 V 12 H 4 Z",
            destructive: false,
        },
        ControlButton {
            id: "close",
            area: WindowControlArea::Close,
            glyph: "M 4,4 L 12,12 M 12,4 L 4,12",
            destructive: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_status_shows_the_stream_size() {
        let (highlight, text) = status(true, true, Some((1280, 720)));
        assert!(highlight);
        assert_eq!(text.as_ref(), "● Tracking 1280x720");
    }

    #[test]
    fn idle_status_depends_on_camera_access() {
        assert_eq!(status(false, true, None).1.as_ref(), "○ Waiting for video");
        assert_eq!(status(false, false, None).1.as_ref(), "○ Camera off");
        assert!(!status(false, false, None).0);
    }
}
