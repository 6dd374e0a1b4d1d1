mod admission;
mod algorithms;
