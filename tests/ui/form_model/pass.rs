use formwork::{FieldLens, FormModel};

#[derive(Clone, formwork::FormModel)]
struct LoginForm {
    email: String,
    password: String,
    remember_me: bool,
}

fn main() {
    let fields = LoginForm::fields();
    let lens = fields.email;
    let mut model = LoginForm {
        email: "a@example.com".to_string(),
        password: String::new(),
        remember_me: false,
    };
    lens.set(&mut model, "b@example.com".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@example.com");
    assert_eq!(
        LoginForm::field_names(),
        ["email", "password", "remember_me"]
    );
}
