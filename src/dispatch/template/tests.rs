use super::*;

fn vars(delta_x: f64, delta_y: f64, scale: f64) -> CommandVariables {
    CommandVariables {
        delta_x,
        delta_y,
        scale,
        delta_angle: 0.0,
    }
}

#[test]
fn substitutes_both_placeholder_forms() {
    let renderer = TemplateRenderer::new().expect("placeholder pattern");
    assert_eq!(
        renderer.render(
            "xdotool mousemove_relative -- $delta_x ${delta_y}",
            &vars(50.0, -12.5, 0.0)
        ),
        "xdotool mousemove_relative -- 50 -12.5"
    );
    assert_eq!(
        renderer.render("zoom ${scale}x", &vars(0.0, 0.0, 1.25)),
        "zoom 1.25x"
    );
}

#[test]
fn every_variable_is_present_even_when_meaningless() {
    let renderer = TemplateRenderer::new().expect("placeholder pattern");
    assert_eq!(
        renderer.render(
            "$delta_x $delta_y $scale $delta_angle",
            &CommandVariables::default()
        ),
        "0 0 0 0"
    );
}

#[test]
fn leaves_other_dollar_words_for_the_shell() {
    let renderer = TemplateRenderer::new().expect("placeholder pattern");
    assert_eq!(
        renderer.render("echo $HOME ${USER} $delta_xyz $ 5$", &vars(1.0, 2.0, 0.0)),
        "echo $HOME ${USER} $delta_xyz $ 5$"
    );
}

#[test]
fn template_without_placeholders_is_unchanged() {
    let renderer = TemplateRenderer::new().expect("placeholder pattern");
    assert_eq!(
        renderer.render("xdotool key alt+Right", &vars(-80.0, 3.0, 0.0)),
        "xdotool key alt+Right"
    );
}

#[test]
fn negative_zero_renders_as_zero() {
    let renderer = TemplateRenderer::new().expect("placeholder pattern");
    assert_eq!(renderer.render("$delta_y", &vars(0.0, -0.0, 0.0)), "0");
}
