use super::{
    AnyElement, AppView, Button, ButtonVariants, CONTROLS_HEIGHT, Context, FluentBuilder,
    InteractiveElement, IntoElement, ObjectFit, PANE_GAP, PANE_PADDING, ParentElement,
    SharedString, Styled, StyledImage, UiElement, Window, div, h_flex, img, px, v_flex,
};

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let titlebar = self.render_titlebar(window, cx);
        let video_pane = self.render_video_pane(cx);
        let mirror_pane = self.render_mirror_pane();
        let controls = self.render_controls(cx);

        let overlay: Option<AnyElement> = if let Some(message) = self.init_error.as_ref() {
            Some(self.render_init_error(message))
        } else if let Some(message) = self.session.loading_message() {
            Some(self.render_loading_overlay(message))
        } else if self.session.is_permission_modal_open() {
            Some(self.render_permission_modal(cx))
        } else if self.session.is_help_modal_open() {
            Some(self.render_help_modal(cx))
        } else {
            None
        };
        let notice = self
            .notice
            .clone()
            .map(|message| self.render_notice(&message, cx));

        v_flex()
            .relative()
            .size_full()
            .bg(gpui::rgb(0x0b0f1a))
            .child(titlebar)
            .child(
                h_flex()
                    .flex_1()
                    .gap(px(PANE_GAP))
                    .p(px(PANE_PADDING))
                    .child(video_pane)
                    .child(mirror_pane),
            )
            .child(controls)
            .when_some(overlay, |this, overlay| this.child(overlay))
            .when_some(notice, |this, notice| this.child(notice))
            .into_any_element()
    }

    fn render_video_pane(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let content: AnyElement = if let Some(err) = self.session.camera_fallback() {
            self.render_camera_fallback(err, cx)
        } else if let Some(image) = &self.video_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element()
        } else {
            placeholder(self.label(UiElement::VideoContainer))
        };

        pane(UiElement::VideoContainer, self.label(UiElement::WebcamVideo), content)
    }

    fn render_mirror_pane(&self) -> AnyElement {
        let content = match &self.mirror_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => placeholder(self.label(UiElement::MirrorContainer)),
        };

        pane(UiElement::MirrorContainer, self.label(UiElement::MirrorContainer), content)
    }

    fn render_controls(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let presence = self.session.presence_label().to_string();

        h_flex()
            .h(px(CONTROLS_HEIGHT))
            .px(px(PANE_PADDING))
            .gap_3()
            .items_center()
            .justify_between()
            .child(
                div()
                    .id(UiElement::HandPresenceLabel.id())
                    .text_sm()
                    .text_color(gpui::rgb(0xe0e0e0))
                    .child(presence),
            )
            .child(
                h_flex()
                    .gap_2()
                    .child(
                        Button::new(SharedString::from(UiElement::CaptureImageButton.id()))
                            .primary()
                            .label(self.label(UiElement::CaptureImageButton))
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.capture_image();
                                cx.notify();
                            })),
                    )
                    .child(
                        Button::new(SharedString::from(UiElement::ClearAllButton.id()))
                            .outline()
                            .label(self.label(UiElement::ClearAllButton))
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.session.clear_3d_view();
                                cx.notify();
                            })),
                    )
                    .child(
                        Button::new(SharedString::from(UiElement::HelpButton.id()))
                            .ghost()
                            .label(self.label(UiElement::HelpButton))
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.session.open_help();
                                cx.notify();
                            })),
                    ),
            )
            .into_any_element()
    }
}

fn pane(element: UiElement, title: SharedString, content: AnyElement) -> AnyElement {
    v_flex()
        .id(element.id())
        .flex_1()
        .rounded_lg()
        .overflow_hidden()
        .bg(gpui::rgb(0x000000))
        .border_1()
        .border_color(gpui::rgba(0x00ffff33))
        .child(
            div()
                .px_3()
                .py_1()
                .text_xs()
                .text_color(gpui::rgb(0x8b95a5))
                .child(title),
        )
        .child(div().flex_1().relative().child(content))
        .into_any_element()
}

fn placeholder(text: SharedString) -> AnyElement {
    div()
        .size_full()
        .flex()
        .items_center()
        .justify_center()
        .text_sm()
        .text_color(gpui::rgb(0x8b95a5))
        .child(text)
        .into_any_element()
}
