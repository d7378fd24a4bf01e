#![allow(clippy::all)]
#![deny(
    unused_variables,
    clippy::unnecessary_mut_passed,
    unused_results
)]

use proc_macro::{self, TokenStream};
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

#[proc_macro_derive(LogicalModule)]
pub fn logical_module_macro_derive(input: TokenStream) -> TokenStream {
    let input: DeriveInput = parse_macro_input!(input);
    let DeriveInput { ident, .. } = input;
    let output = quote! {

        impl #ident{
            pub fn new(args: LogicalModuleNewArgs) -> Self {
                let ret = Self::inner_new(args);
                ret
            }

            pub fn name() -> &'static str {
                stringify!(#ident)
            }
        }

    };
    output.into()
}
