use super::{
    AnyElement, AppView, Button, ButtonVariants, Context, InteractiveElement, IntoElement,
    ParentElement, SharedString, Styled, StyledExt, UiElement, div, h_flex, v_flex,
};
use crate::error::CameraError;

fn backdrop() -> gpui::Div {
    div()
        .absolute()
        .top_0()
        .left_0()
        .size_full()
        .flex()
        .items_center()
        .justify_center()
        .bg(gpui::rgba(0x05070dcc))
}

fn card() -> gpui::Div {
    v_flex()
        .gap_3()
        .p_6()
        .max_w(gpui::px(460.0))
        .rounded_xl()
        .bg(gpui::rgba(0x1a1a3af5))
        .border_1()
        .border_color(gpui::rgba(0x00ffff55))
        .shadow_lg()
}

impl AppView {
    pub(super) fn render_loading_overlay(&self, message: &str) -> AnyElement {
        backdrop()
            .child(
                v_flex()
                    .gap_2()
                    .items_center()
                    .child(div().text_2xl().text_color(gpui::rgb(0x00ffff)).child("⟳"))
                    .child(
                        div()
                            .text_color(gpui::rgb(0xe0e0e0))
                            .child(message.to_string()),
                    ),
            )
            .into_any_element()
    }

    pub(super) fn render_permission_modal(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        backdrop()
            .child(
                card()
                    .child(
                        div()
                            .text_lg()
                            .font_semibold()
                            .text_color(gpui::rgb(0x00ffff))
                            .child("Camera Access"),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(gpui::rgb(0xe0e0e0))
                            .child(self.label(UiElement::PermissionModal)),
                    )
                    .child(
                        Button::new(SharedString::from(UiElement::GrantCameraButton.id()))
                            .primary()
                            .w_full()
                            .label(self.label(UiElement::GrantCameraButton))
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.grant_camera_access();
                                cx.notify();
                            })),
                    ),
            )
            .into_any_element()
    }

    pub(super) fn render_help_modal(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        backdrop()
            .child(
                card()
                    .child(
                        div()
                            .text_lg()
                            .font_semibold()
                            .text_color(gpui::rgb(0x00ffff))
                            .child(self.label(UiElement::HelpButton)),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(gpui::rgb(0xe0e0e0))
                            .child(self.label(UiElement::HelpModal)),
                    )
                    .child(
                        Button::new(SharedString::from(UiElement::CloseHelpModalButton.id()))
                            .outline()
                            .label(self.label(UiElement::CloseHelpModalButton))
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.session.close_help();
                                cx.notify();
                            })),
                    ),
            )
            .into_any_element()
    }

    /// Shown inside the video pane while the camera is unavailable.
    pub(super) fn render_camera_fallback(
        &self,
        err: &CameraError,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let (headline, guidance) = err.fallback_text();
        v_flex()
            .id(UiElement::NoCameraFallback.id())
            .size_full()
            .gap_2()
            .p_4()
            .items_center()
            .justify_center()
            .bg(gpui::rgba(0x7f1d1d33))
            .child(div().text_color(gpui::rgb(0xfca5a5)).child(headline))
            .child(
                div()
                    .text_xs()
                    .text_color(gpui::rgb(0xfca5a5))
                    .child(guidance),
            )
            .child(
                Button::new(SharedString::from("retry-camera"))
                    .outline()
                    .label(self.label(UiElement::GrantCameraButton))
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.grant_camera_access();
                        cx.notify();
                    })),
            )
            .into_any_element()
    }

    pub(super) fn render_init_error(&self, message: &SharedString) -> AnyElement {
        backdrop()
            .child(
                card()
                    .border_color(gpui::rgba(0xef4444aa))
                    .child(
                        div()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child(message.clone()),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xa0aab8))
                            .child("⚠️ Application initialization failed. Check the log for details."),
                    ),
            )
            .into_any_element()
    }

    pub(super) fn render_notice(
        &self,
        message: &SharedString,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        div()
            .absolute()
            .top(gpui::px(super::TITLEBAR_HEIGHT + 8.0))
            .left_0()
            .w_full()
            .flex()
            .justify_center()
            .child(
                h_flex()
                    .gap_3()
                    .items_center()
                    .px_4()
                    .py_2()
                    .rounded_lg()
                    .bg(gpui::rgba(0xef444433))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444ff))
                    .child(
                        div()
                            .text_sm()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child(message.clone()),
                    )
                    .child(
                        Button::new(SharedString::from("dismiss-notice"))
                            .ghost()
                            .label("OK")
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.notice = None;
                                cx.notify();
                            })),
                    ),
            )
            .into_any_element()
    }
}
