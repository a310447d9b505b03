pub(crate) mod validator;
