use super::*;

#[test]
fn full_navigation_keeps_the_latest_location() {
    let navigation = FullNavigation::new();
    assert_eq!(navigation.last_location(), None);

    navigation.navigate("/login");
    navigation.navigate("/login?redirect=%2Fdashboard");
    assert_eq!(navigation.last_location().as_deref(), Some("/login?redirect=%2Fdashboard"));
}
